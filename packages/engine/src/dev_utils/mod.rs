//! Markup helpers for tests, benchmarks and tooling.

pub mod model_markup;
pub mod view_markup;

pub use model_markup::{get_data, parse_model, set_data, stringify_node, ParsedModel};
pub use view_markup::{parse_html, parse_html_into, stringify_children, stringify_with_selection};
