//! Filing index page parsing.

use scraper::{Html, Selector};
use url::Url;

/// Document links found on an accession's `-index.html` page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexLinks {
    /// Rendered information table (`.html`).
    pub info_table: Option<String>,
    /// Complete submission text file.
    pub complete_text: Option<String>,
}

/// Extract document links from the first table of an index page.
///
/// The information-table row is one whose markup mentions "table" and whose
/// link text ends in `.html`; the last matching row wins. The complete
/// submission is the link in the table's last row. Relative links are
/// resolved against `base`.
pub fn parse_index_page(html: &str, base: &str) -> IndexLinks {
    let document = Html::parse_document(html);
    let mut links = IndexLinks::default();

    let (Ok(table_sel), Ok(row_sel), Ok(link_sel)) = (
        Selector::parse("table"),
        Selector::parse("tr"),
        Selector::parse("a"),
    ) else {
        return links;
    };

    let Some(table) = document.select(&table_sel).next() else {
        return links;
    };

    let resolve = |href: &str| {
        Url::parse(base)
            .and_then(|b| b.join(href))
            .ok()
            .map(|u| u.to_string())
    };

    let rows: Vec<_> = table.select(&row_sel).collect();
    for row in &rows {
        let Some(anchor) = row.select(&link_sel).next() else {
            continue;
        };
        let text: String = anchor.text().collect();
        let row_markup = row.html().to_lowercase();
        if row_markup.contains("table") && text.trim().ends_with(".html") {
            if let Some(href) = anchor.value().attr("href") {
                links.info_table = resolve(href);
            }
        }
    }

    if let Some(anchor) = rows.last().and_then(|row| row.select(&link_sel).next()) {
        if let Some(href) = anchor.value().attr("href") {
            links.complete_text = resolve(href);
        }
    }

    links
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX: &str = r#"
<html><body>
<table class="tableFile" summary="Document Format Files">
  <tr><th>Seq</th><th>Description</th><th>Document</th><th>Type</th><th>Size</th></tr>
  <tr><td>1</td><td></td>
      <td><a href="/Archives/edgar/data/1067983/000095012324002518/xslForm13F_X02/primary_doc.xml">primary_doc.html</a></td>
      <td>13F-HR</td><td>4 KB</td></tr>
  <tr><td>2</td><td>INFORMATION TABLE</td>
      <td><a href="/Archives/edgar/data/1067983/000095012324002518/xslForm13F_X02/46994.xml">46994.html</a></td>
      <td>INFORMATION TABLE</td><td>41 KB</td></tr>
  <tr><td>3</td><td>INFORMATION TABLE</td>
      <td><a href="/Archives/edgar/data/1067983/000095012324002518/46994.xml">46994.xml</a></td>
      <td>INFORMATION TABLE</td><td>23 KB</td></tr>
  <tr><td>&nbsp;</td><td>Complete submission text file</td>
      <td><a href="/Archives/edgar/data/1067983/000095012324002518/0000950123-24-002518.txt">0000950123-24-002518.txt</a></td>
      <td>&nbsp;</td><td>66 KB</td></tr>
</table>
<table><tr><td><a href="/other.html">other.html</a></td></tr></table>
</body></html>"#;

    const BASE: &str = "https://www.sec.gov";

    #[test]
    fn test_parse_index_links() {
        let links = parse_index_page(INDEX, BASE);
        assert_eq!(
            links.info_table.as_deref(),
            Some("https://www.sec.gov/Archives/edgar/data/1067983/000095012324002518/xslForm13F_X02/46994.xml")
        );
        assert_eq!(
            links.complete_text.as_deref(),
            Some("https://www.sec.gov/Archives/edgar/data/1067983/000095012324002518/0000950123-24-002518.txt")
        );
    }

    #[test]
    fn test_parse_index_without_table() {
        let links = parse_index_page("<html><body><p>gone</p></body></html>", BASE);
        assert_eq!(links, IndexLinks::default());
    }
}
