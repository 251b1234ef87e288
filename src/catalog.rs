//! Structured output of a run: catalog line items.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One catalog record reconstructed from OCR text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub name: String,
    pub size: String,
    pub uom: String,
    /// Exact in memory, a JSON number on the wire.
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
}

impl LineItem {
    /// Render the item back into the multi-line layout the parser reads.
    ///
    /// Empty fields are omitted; the price line is always written.
    pub fn to_lines(&self) -> Vec<String> {
        let mut lines = vec![format!("{} | - |", self.name)];
        if !self.size.is_empty() {
            lines.push(format!("Size: {}", self.size));
        }
        if !self.uom.is_empty() {
            lines.push(format!("UOM: {}", self.uom));
        }
        // Pad to cents, never round away digits the parser read
        if self.price.scale() < 2 {
            lines.push(format!("${:.2}", self.price));
        } else {
            lines.push(format!("${}", self.price));
        }
        lines
    }
}

/// Ordered sequence of line items, the terminal artifact of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    pub items: Vec<LineItem>,
}

impl Catalog {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Serialise as `{"items": [...]}` with 4-space indentation.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut ser)?;
        // serde_json only ever writes UTF-8
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Reconstruct parser-readable text for every item, in order.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for item in &self.items {
            for line in item.to_lines() {
                out.push_str(&line);
                out.push('\n');
            }
        }
        out
    }
}

impl From<Vec<LineItem>> for Catalog {
    fn from(items: Vec<LineItem>) -> Self {
        Self { items }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn widget() -> LineItem {
        LineItem {
            name: "Widget A".into(),
            size: "2 X 500GR".into(),
            uom: "EA".into(),
            price: Decimal::new(1250, 2),
        }
    }

    #[test]
    fn json_shape_and_float_price() {
        let catalog = Catalog::from(vec![widget()]);
        let json = catalog.to_json_pretty().unwrap();

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let item = &value["items"][0];
        assert_eq!(item["name"], "Widget A");
        assert_eq!(item["size"], "2 X 500GR");
        assert_eq!(item["uom"], "EA");
        assert_eq!(item["price"].as_f64(), Some(12.5));

        assert!(json.contains("\n    \"items\""), "4-space indent, got:\n{json}");
    }

    #[test]
    fn empty_catalog_serialises_items_array() {
        let json = Catalog::default().to_json_pretty().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value["items"].as_array().unwrap().is_empty());
    }

    #[test]
    fn json_reads_back() {
        let catalog = Catalog::from(vec![widget()]);
        let json = catalog.to_json_pretty().unwrap();
        let back: Catalog = serde_json::from_str(&json).unwrap();
        assert_eq!(back.items[0].price, Decimal::new(125, 1));
    }

    #[test]
    fn lines_skip_empty_fields() {
        let item = LineItem {
            name: "Widget B".into(),
            price: Decimal::new(3, 0),
            ..Default::default()
        };
        assert_eq!(item.to_lines(), vec!["Widget B | - |", "$3.00"]);
    }

    #[test]
    fn price_line_keeps_sub_cent_digits() {
        let item = LineItem {
            name: "Bulk rice".into(),
            price: Decimal::new(12345, 3),
            ..Default::default()
        };
        assert_eq!(item.to_lines().last().map(String::as_str), Some("$12.345"));

        let tenths = LineItem {
            price: Decimal::new(125, 1),
            ..widget()
        };
        assert_eq!(tenths.to_lines().last().map(String::as_str), Some("$12.50"));
    }
}
