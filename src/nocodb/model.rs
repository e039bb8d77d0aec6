use serde::Deserialize;
use serde_json::Value;

/// One page of `GET /api/v2/tables/{table}/records`.
#[derive(Debug, Deserialize)]
pub struct ListPage {
    #[serde(default)]
    pub list: Vec<Value>,
    #[serde(rename = "pageInfo", default)]
    pub page_info: Option<PageInfo>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    #[serde(default)]
    pub is_last_page: Option<bool>,
}

impl ListPage {
    /// True when the server says so, or when the page came back short.
    pub fn is_last(&self, limit: u32) -> bool {
        let short = self.list.len() < limit as usize;
        let flagged = self
            .page_info
            .as_ref()
            .and_then(|p| p.is_last_page)
            .unwrap_or(false);
        short || flagged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn last_page_from_flag_or_short_page() {
        let flagged: ListPage = serde_json::from_value(json!({
            "list": [{"Id": 1}, {"Id": 2}],
            "pageInfo": {"totalRows": 9, "isLastPage": true}
        }))
        .unwrap();
        assert!(flagged.is_last(2));

        let full: ListPage = serde_json::from_value(json!({
            "list": [{"Id": 1}, {"Id": 2}],
            "pageInfo": {"totalRows": 9, "isLastPage": false}
        }))
        .unwrap();
        assert!(!full.is_last(2));

        let short: ListPage = serde_json::from_value(json!({"list": [{"Id": 1}]})).unwrap();
        assert!(short.is_last(2));
    }
}
