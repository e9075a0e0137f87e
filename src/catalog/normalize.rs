// src/catalog/normalize.rs
// =============================================================================
// Turns raw catalog items into LinkRecords.
//
// Each upstream item describes one form/service with up to three URLs
// (en_url, tc_url, sc_url). We pick one department/title pair per item and
// emit one record per populated URL.
//
// Order matters: records come out in item order, then en, tc, sc within an
// item. Progress reporting ("12 of 340") is indexed by this order.
// =============================================================================

use serde_json::{Map, Value};

use crate::model::{Dataset, Lang, LinkRecord};

// Normalizes a whole catalog payload
pub fn normalize(dataset: Dataset, items: &[Value]) -> Vec<LinkRecord> {
    let mut records = Vec::new();

    for item in items {
        // Non-object entries carry no fields we could use
        let Some(fields) = item.as_object() else {
            continue;
        };

        let (department, title) = match dataset {
            Dataset::Eforms => form_heading(fields),
            Dataset::Services => service_heading(fields),
        };

        for lang in Lang::ORDER {
            let key = format!("{}_url", lang);
            let Some(url) = text(fields, &key) else {
                continue;
            };

            records.push(LinkRecord {
                department: department.clone(),
                title: title.clone(),
                lang,
                url,
            });
        }
    }

    records
}

// e-forms: the first language whose department AND title are both present.
// Presence is judged before trimming, so a whitespace-only pair still wins
// and yields empty strings.
fn form_heading(fields: &Map<String, Value>) -> (String, String) {
    for lang in [Lang::En, Lang::Tc] {
        let department = raw(fields, &format!("{}_department", lang));
        let title = raw(fields, &format!("{}_title", lang));
        if let (Some(department), Some(title)) = (department, title) {
            return (department.trim().to_string(), title.trim().to_string());
        }
    }

    (
        raw(fields, "sc_department").unwrap_or_default().trim().to_string(),
        raw(fields, "sc_title").unwrap_or_default().trim().to_string(),
    )
}

// services: department by language fallback, title from the English
// function name (or its alternate field)
fn service_heading(fields: &Map<String, Value>) -> (String, String) {
    let department = Lang::ORDER
        .iter()
        .find_map(|lang| raw(fields, &format!("{}_department", lang)))
        .unwrap_or_default()
        .trim()
        .to_string();
    let title = text(fields, "en_fun")
        .or_else(|| text(fields, "en_fun_a"))
        .unwrap_or_default();

    (department, title)
}

// A non-empty string field, untrimmed
fn raw<'a>(fields: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    fields
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

// A trimmed, non-empty string field
fn text(fields: &Map<String, Value>, key: &str) -> Option<String> {
    fields
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_english_pair_preferred() {
        let items = vec![json!({
            "en_department": " Dept A ", "en_title": "Form 1",
            "tc_department": "部門", "tc_title": "表格",
            "en_url": " https://x/en ", "tc_url": "https://x/tc"
        })];

        let records = normalize(Dataset::Eforms, &items);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].department, "Dept A");
        assert_eq!(records[0].title, "Form 1");
        assert_eq!(records[0].url, "https://x/en");
        assert_eq!(records[1].lang, Lang::Tc);
        assert_eq!(records[1].department, "Dept A");
    }

    #[test]
    fn test_falls_back_to_chinese_pairs() {
        let items = vec![
            json!({
                "en_department": "Dept A",
                "tc_department": "部門", "tc_title": "表格",
                "tc_url": "https://x/tc"
            }),
            json!({
                "sc_department": "部门",
                "sc_url": "https://x/sc"
            }),
        ];

        let records = normalize(Dataset::Eforms, &items);
        assert_eq!(records[0].department, "部門");
        assert_eq!(records[0].title, "表格");
        assert_eq!(records[1].department, "部门");
        assert_eq!(records[1].title, "");
    }

    #[test]
    fn test_blank_english_pair_still_selected() {
        let items = vec![json!({
            "en_department": "  ", "en_title": " ",
            "tc_department": "部門", "tc_title": "表格",
            "en_url": "https://x/en"
        })];

        let records = normalize(Dataset::Eforms, &items);
        assert_eq!(records[0].department, "");
        assert_eq!(records[0].title, "");
    }

    #[test]
    fn test_order_and_empty_urls() {
        let items = vec![
            json!({"en_department": "A", "en_title": "1",
                   "sc_url": "https://a/sc", "en_url": "https://a/en", "tc_url": "  "}),
            json!({"en_department": "B", "en_title": "2"}),
            json!("not an object"),
            json!({"en_department": "C", "en_title": "3", "tc_url": "https://c/tc"}),
        ];

        let urls: Vec<_> = normalize(Dataset::Eforms, &items)
            .into_iter()
            .map(|r| r.url)
            .collect();
        assert_eq!(urls, vec!["https://a/en", "https://a/sc", "https://c/tc"]);
    }

    #[test]
    fn test_services_heading() {
        let items = vec![
            json!({"tc_department": "部門", "en_fun": "", "en_fun_a": "Renew licence",
                   "en_url": "https://s/1"}),
            json!({"en_department": "Dept B", "en_fun": " Book slot ",
                   "en_url": "https://s/2"}),
        ];

        let records = normalize(Dataset::Services, &items);
        assert_eq!(records[0].department, "部門");
        assert_eq!(records[0].title, "Renew licence");
        assert_eq!(records[1].title, "Book slot");
    }
}
