//! Which elements and attributes may appear where.

use super::{Document, NodeId, Range, ROOT_NAME, TEXT_NAME};
use indexmap::IndexMap;

/// Placeholder used in `allow_in` meaning "any element registered as a block".
pub const BLOCK: &str = "$block";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemDefinition {
    pub allow_in: Vec<String>,
    pub allow_attributes: Vec<String>,
    pub is_block: bool,
    pub is_inline: bool,
    pub is_object: bool,
    pub is_limit: bool,
}

impl ItemDefinition {
    pub fn allowed_in(mut self, parent: &str) -> Self {
        self.allow_in.push(parent.to_string());
        self
    }

    pub fn with_attributes(mut self, keys: &[&str]) -> Self {
        self.allow_attributes
            .extend(keys.iter().map(|k| k.to_string()));
        self
    }

    pub fn block(mut self) -> Self {
        self.is_block = true;
        self
    }

    pub fn inline(mut self) -> Self {
        self.is_inline = true;
        self
    }

    pub fn object(mut self) -> Self {
        self.is_object = true;
        self.is_limit = true;
        self
    }

    pub fn limit(mut self) -> Self {
        self.is_limit = true;
        self
    }
}

#[derive(Debug, Clone)]
pub struct Schema {
    items: IndexMap<String, ItemDefinition>,
}

impl Default for Schema {
    fn default() -> Self {
        Self::new()
    }
}

impl Schema {
    /// Schema knowing only the root and text.
    pub fn new() -> Self {
        let mut items = IndexMap::new();
        items.insert(ROOT_NAME.to_string(), ItemDefinition::default().limit());
        items.insert(
            TEXT_NAME.to_string(),
            ItemDefinition::default().allowed_in(BLOCK).inline(),
        );
        Self { items }
    }

    pub fn register(&mut self, name: &str, definition: ItemDefinition) {
        self.items.insert(name.to_string(), definition);
    }

    /// Modifies an existing definition; unknown names are registered empty first.
    pub fn extend(&mut self, name: &str, f: impl FnOnce(&mut ItemDefinition)) {
        f(self.items.entry(name.to_string()).or_default());
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.items.contains_key(name)
    }

    pub fn definition(&self, name: &str) -> Option<&ItemDefinition> {
        self.items.get(name)
    }

    /// Registered item names, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.items.keys().map(String::as_str)
    }

    /// Allows `key` on every registered block.
    pub fn allow_attribute_on_blocks(&mut self, key: &str) {
        for definition in self.items.values_mut().filter(|d| d.is_block) {
            if !definition.allow_attributes.iter().any(|k| k == key) {
                definition.allow_attributes.push(key.to_string());
            }
        }
    }

    pub fn is_block(&self, name: &str) -> bool {
        self.items.get(name).map_or(false, |d| d.is_block)
    }

    pub fn is_inline(&self, name: &str) -> bool {
        self.items.get(name).map_or(false, |d| d.is_inline)
    }

    pub fn is_object(&self, name: &str) -> bool {
        self.items.get(name).map_or(false, |d| d.is_object)
    }

    pub fn is_limit(&self, name: &str) -> bool {
        self.items.get(name).map_or(false, |d| d.is_limit)
    }

    pub fn check_child(&self, parent: &str, child: &str) -> bool {
        let Some(definition) = self.items.get(child) else {
            return false;
        };
        definition
            .allow_in
            .iter()
            .any(|allowed| allowed == parent || (allowed == BLOCK && self.is_block(parent)))
    }

    pub fn check_attribute(&self, item: &str, key: &str) -> bool {
        self.items
            .get(item)
            .map_or(false, |d| d.allow_attributes.iter().any(|k| k == key))
    }

    /// Whether text could be typed with `key` at the selection.
    pub fn check_attribute_in_selection(&self, doc: &Document, key: &str) -> bool {
        let selection = doc.selection();
        if selection.is_collapsed() {
            let parent = selection.first_position().parent;
            let name = doc.name(parent).unwrap_or_default();
            return self.check_child(name, TEXT_NAME) && self.check_attribute(TEXT_NAME, key);
        }
        self.valid_ranges(doc, &selection.range(), key)
            .map_or(false, |ranges| !ranges.is_empty())
    }

    /// Flat sub-ranges of `range` whose items accept `key`.
    pub fn valid_ranges(&self, doc: &Document, range: &Range, key: &str) -> crate::Result<Vec<Range>> {
        let mut result = Vec::new();
        for flat in doc.flat_ranges(range)? {
            self.collect_valid(doc, flat.start.parent, flat.start.offset, flat.end.offset, key, &mut result);
        }
        Ok(result)
    }

    fn collect_valid(
        &self,
        doc: &Document,
        parent: NodeId,
        from: usize,
        to: usize,
        key: &str,
        out: &mut Vec<Range>,
    ) {
        let mut run: Option<usize> = None;
        let mut offset = 0;
        for child in doc.children(parent) {
            let size = doc.offset_size(*child);
            let (start, end) = (offset, offset + size);
            offset = end;
            if end <= from || start >= to {
                continue;
            }
            let name = doc.name(*child).unwrap_or_default();
            if self.check_attribute(name, key) {
                run.get_or_insert(start.max(from));
                continue;
            }
            if let Some(run_start) = run.take() {
                out.push(Range::flat(parent, run_start, start));
            }
            if doc.is_element(*child) {
                let max = doc.max_offset(*child);
                self.collect_valid(doc, *child, 0, max, key, out);
            }
        }
        if let Some(run_start) = run {
            out.push(Range::flat(parent, run_start, to.min(offset)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        let mut schema = Schema::new();
        schema.register("paragraph", ItemDefinition::default().allowed_in(ROOT_NAME).block());
        schema.extend(TEXT_NAME, |d| d.allow_attributes.push("bold".into()));
        schema
    }

    #[test]
    fn test_block_placeholder_allows_text_in_paragraph() {
        let schema = schema();
        assert!(schema.check_child("paragraph", TEXT_NAME));
        assert!(!schema.check_child(ROOT_NAME, TEXT_NAME));
        assert!(schema.check_child(ROOT_NAME, "paragraph"));
    }

    #[test]
    fn test_check_attribute() {
        let schema = schema();
        assert!(schema.check_attribute(TEXT_NAME, "bold"));
        assert!(!schema.check_attribute("paragraph", "bold"));
    }
}
