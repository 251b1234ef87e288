//! Line-item parser: rebuild catalog records from merged OCR text.
//!
//! The supplier catalog layout spreads one item over several lines:
//!
//! ```text
//! Widget A | 123456 | CTN
//! Size: 2 X 500GR
//! UOM: EA
//! $12.50 ex GST
//! ```
//!
//! The parser is a two-state machine (`Idle`, `Building`) making a single
//! pass over trimmed lines. Every line is tested against all four patterns
//! independently and in a fixed order (item, size, UOM, price), so an item
//! row that also carries a price sets both. Lines that match nothing are OCR
//! noise and leave the state untouched. The parser is total: it never
//! rejects input.

use crate::catalog::{Catalog, LineItem};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::debug;

/// Leading text followed by at least one `| … |` column.
static RE_ITEM_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(.*)\| .* \|").unwrap());

static RE_SIZE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Size:\s+(\d+ X \d+GR)").unwrap());

static RE_UOM_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^UOM:\s+(\w+)").unwrap());

/// First dollar amount anywhere on the line.
static RE_PRICE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$(\d+\.\d+)").unwrap());

#[derive(Debug)]
enum ParserState {
    Idle,
    Building(LineItem),
}

/// Incremental line-item parser.
///
/// Feed lines with [`LineItemParser::feed_line`], then call
/// [`LineItemParser::finish`] to flush the item in progress. A parser holds
/// no state beyond one document pass; create a new one per input.
#[derive(Debug)]
pub struct LineItemParser {
    state: ParserState,
    items: Vec<LineItem>,
}

impl Default for LineItemParser {
    fn default() -> Self {
        Self::new()
    }
}

impl LineItemParser {
    pub fn new() -> Self {
        Self {
            state: ParserState::Idle,
            items: Vec::new(),
        }
    }

    /// Process one line of OCR text.
    pub fn feed_line(&mut self, raw: &str) {
        let line = raw.trim();

        if let Some(caps) = RE_ITEM_LINE.captures(line) {
            let name = caps[1].trim().to_string();
            match &mut self.state {
                ParserState::Building(current) if !current.name.is_empty() => {
                    let done = std::mem::take(current);
                    self.items.push(done);
                    current.name = name;
                }
                ParserState::Building(current) => current.name = name,
                ParserState::Idle => {
                    self.state = ParserState::Building(LineItem {
                        name,
                        ..Default::default()
                    });
                }
            }
        }

        let ParserState::Building(current) = &mut self.state else {
            return;
        };

        if let Some(caps) = RE_SIZE_LINE.captures(line) {
            current.size = caps[1].to_string();
        }

        if let Some(caps) = RE_UOM_LINE.captures(line) {
            current.uom = caps[1].to_string();
        }

        if let Some(caps) = RE_PRICE.captures(line) {
            match Decimal::from_str(&caps[1]) {
                Ok(price) => current.price = price,
                Err(e) => debug!("Ignoring unparsable price {:?}: {}", &caps[1], e),
            }
        }
    }

    /// Flush the in-progress item (if it has a name) and return the catalog.
    pub fn finish(mut self) -> Catalog {
        if let ParserState::Building(current) = self.state {
            if !current.name.is_empty() {
                self.items.push(current);
            }
        }
        Catalog::from(self.items)
    }
}

/// Parse merged OCR text into a catalog in a single pass.
pub fn parse_catalog(text: &str) -> Catalog {
    let mut parser = LineItemParser::new();
    for line in text.lines() {
        parser.feed_line(line);
    }
    parser.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_lines(lines: &[&str]) -> Vec<LineItem> {
        parse_catalog(&lines.join("\n")).items
    }

    #[test]
    fn two_items_with_partial_fields() {
        let items = parse_lines(&[
            "Widget A | x | y",
            "Size: 2 X 500GR",
            "UOM: EA",
            "$12.50",
            "Widget B | x | y",
            "$3.00",
        ]);

        assert_eq!(items.len(), 2);
        assert_eq!(
            items[0],
            LineItem {
                name: "Widget A".into(),
                size: "2 X 500GR".into(),
                uom: "EA".into(),
                price: Decimal::new(1250, 2),
            }
        );
        assert_eq!(
            items[1],
            LineItem {
                name: "Widget B".into(),
                size: String::new(),
                uom: String::new(),
                price: Decimal::new(300, 2),
            }
        );
    }

    #[test]
    fn bare_item_lines_emit_with_defaults() {
        let items = parse_lines(&["Alpha | a | b", "Beta | a | b"]);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name, "Alpha");
        assert!(items[0].size.is_empty());
        assert!(items[0].uom.is_empty());
        assert_eq!(items[0].price, Decimal::ZERO);
        assert_eq!(items[1].name, "Beta");
    }

    #[test]
    fn noise_lines_leave_current_item_untouched() {
        let with_noise = parse_lines(&[
            "Widget A | x | y",
            "~~ ,. ;;",
            "Size 2 X 500GR",
            "Page 3 of 12",
            "UOM: EA",
            "",
            "$12.50",
        ]);
        let without_noise = parse_lines(&["Widget A | x | y", "UOM: EA", "$12.50"]);
        assert_eq!(with_noise, without_noise);
    }

    #[test]
    fn fields_before_first_item_are_ignored() {
        let items = parse_lines(&["Size: 1 X 100GR", "UOM: CTN", "$9.99", "Widget | x | y"]);
        assert_eq!(items.len(), 1);
        assert!(items[0].size.is_empty());
        assert!(items[0].uom.is_empty());
        assert_eq!(items[0].price, Decimal::ZERO);
    }

    #[test]
    fn item_line_is_also_scanned_for_price() {
        let items = parse_lines(&["Cheddar 1kg | 1234 | $14.20"]);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "Cheddar 1kg");
        assert_eq!(items[0].price, Decimal::new(1420, 2));
    }

    #[test]
    fn first_price_on_a_line_wins_and_later_lines_overwrite() {
        let items = parse_lines(&[
            "Widget | x | y",
            "was $4.00 now $3.50",
            "$2.25 member",
        ]);
        assert_eq!(items[0].price, Decimal::new(225, 2));

        let items = parse_lines(&["Widget | x | y", "was $4.00 now $3.50"]);
        assert_eq!(items[0].price, Decimal::new(400, 2));
    }

    #[test]
    fn unparsable_price_keeps_previous_value() {
        // \d also matches non-ASCII digits, which Decimal rejects
        let items = parse_lines(&["Widget | x | y", "$5.10", "$١٢.٥٠"]);
        assert_eq!(items[0].price, Decimal::new(510, 2));
    }

    #[test]
    fn lines_are_trimmed_before_matching() {
        let items = parse_lines(&["   Widget | x | y   ", "\tSize: 12 X 50GR", "  UOM: KG  "]);
        assert_eq!(items[0].name, "Widget");
        assert_eq!(items[0].size, "12 X 50GR");
        assert_eq!(items[0].uom, "KG");
    }

    #[test]
    fn pipe_without_column_is_not_an_item() {
        let items = parse_lines(&["Subtotal | 40.00", "Widget | x | y"]);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "Widget");
    }

    #[test]
    fn empty_name_item_is_not_emitted() {
        let items = parse_lines(&["| x |", "$1.00"]);
        assert!(items.is_empty());
    }

    #[test]
    fn empty_input_yields_empty_catalog() {
        assert!(parse_catalog("").is_empty());
        assert!(parse_catalog("\n\n   \n").is_empty());
    }

    #[test]
    fn crlf_input() {
        let items = parse_catalog("Widget | x | y\r\nUOM: EA\r\n$1.50\r\n").items;
        assert_eq!(items[0].uom, "EA");
        assert_eq!(items[0].price, Decimal::new(150, 2));
    }

    #[test]
    fn reparsing_rendered_catalog_is_stable() {
        let first = parse_lines(&[
            "Widget A | x | y",
            "Size: 2 X 500GR",
            "UOM: EA",
            "$12.50",
            "Widget B | x | y",
            "$3.00",
            "Widget C | x | y",
            "UOM: CTN",
            "Widget D | x | y",
            "$12.345",
        ]);
        assert_eq!(first[3].price, Decimal::new(12345, 3));
        let rendered = Catalog::from(first.clone()).to_text();
        let second = parse_catalog(&rendered).items;
        assert_eq!(first, second);
    }
}
