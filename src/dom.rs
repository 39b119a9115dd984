use std::sync::LazyLock;

use anyhow::{Context, Result};
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};

use crate::parser::text::normalize;

static ANY_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("*").unwrap());
static ROW_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static CELL_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("th,td").unwrap());

/// One element of a flattened, document-ordered page snapshot. `text` is
/// the element's rendered text including descendants, so wrapper elements
/// repeat the text of what they contain; the pipeline is built for that.
/// `table` carries rows-of-cells for `<table>` elements only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageNode {
    pub tag: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<Vec<Vec<String>>>,
}

impl PageNode {
    pub fn text(tag: &str, text: &str) -> Self {
        Self {
            tag: tag.to_string(),
            text: normalize(text),
            table: None,
        }
    }

    pub fn table(rows: Vec<Vec<String>>) -> Self {
        let text = normalize(&rows.concat().join(" "));
        Self {
            tag: "table".to_string(),
            text,
            table: Some(rows),
        }
    }
}

/// Static-HTML adapter: parse a page with the `scraper` crate and flatten
/// it into the snapshot the extraction pipeline consumes.
pub fn snapshot_from_html(html: &str) -> Vec<PageNode> {
    let doc = Html::parse_document(html);

    doc.select(&ANY_SEL)
        .map(|el| {
            let tag = el.value().name().to_lowercase();
            let text = normalize(&el.text().collect::<String>());
            let table = (tag == "table").then(|| {
                el.select(&ROW_SEL)
                    .map(|row| {
                        row.select(&CELL_SEL)
                            .map(|cell| normalize(&cell.text().collect::<String>()))
                            .collect()
                    })
                    .collect()
            });
            PageNode { tag, text, table }
        })
        .collect()
}

/// Live-page adapter: decode the JSON element snapshot a browser-side
/// collector hands over. Text is re-normalized on the way in so the
/// pipeline never sees raw whitespace.
pub fn snapshot_from_json(json: &str) -> Result<Vec<PageNode>> {
    let mut nodes: Vec<PageNode> =
        serde_json::from_str(json).context("invalid page snapshot JSON")?;

    for node in &mut nodes {
        node.tag = node.tag.to_lowercase();
        node.text = normalize(&node.text);
        if let Some(rows) = &mut node.table {
            for row in rows {
                for cell in row {
                    *cell = normalize(cell);
                }
            }
        }
    }
    Ok(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattens_in_document_order() {
        let html = "<html><body><h3>Semester 1</h3><p>SGPA: 8.0</p></body></html>";
        let nodes = snapshot_from_html(html);
        let tags: Vec<&str> = nodes.iter().map(|n| n.tag.as_str()).collect();
        let h3 = tags.iter().position(|t| *t == "h3").unwrap();
        let p = tags.iter().position(|t| *t == "p").unwrap();
        assert!(h3 < p);
        assert_eq!(nodes[h3].text, "Semester 1");
    }

    #[test]
    fn wrapper_text_includes_descendants() {
        let html = "<div><span>Semester</span> <b>III</b></div>";
        let nodes = snapshot_from_html(html);
        let div = nodes.iter().find(|n| n.tag == "div").unwrap();
        assert_eq!(div.text, "Semester III");
    }

    #[test]
    fn tables_carry_normalized_rows() {
        let html = "<table><tr><th> Code </th><th>Subject\nName</th></tr>\
                    <tr><td>CS101</td><td>  Programming   Fundamentals </td></tr></table>";
        let nodes = snapshot_from_html(html);
        let table = nodes.iter().find(|n| n.tag == "table").unwrap();
        let rows = table.table.as_ref().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec!["Code", "Subject Name"]);
        assert_eq!(rows[1], vec!["CS101", "Programming Fundamentals"]);
    }

    #[test]
    fn json_snapshot_is_renormalized() {
        let json = r#"[
            {"tag":"H3","text":"  Semester \n 2 "},
            {"tag":"table","text":"","table":[[" CS201 ","Data  Structures"]]}
        ]"#;
        let nodes = snapshot_from_json(json).unwrap();
        assert_eq!(nodes[0].tag, "h3");
        assert_eq!(nodes[0].text, "Semester 2");
        assert_eq!(nodes[1].table.as_ref().unwrap()[0][0], "CS201");
    }

    #[test]
    fn malformed_snapshot_is_an_error() {
        assert!(snapshot_from_json("not json").is_err());
    }
}
