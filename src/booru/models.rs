use serde::Deserialize;

/// Parameters of one `search/images` request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub query: String,
    /// Empty key means the anonymous public API
    pub api_key: String,
    /// 1-based page index
    pub page: u64,
    pub per_page: u64,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            api_key: api_key.into(),
            page: 1,
            per_page: 1,
        }
    }

    pub fn page(mut self, page: u64) -> Self {
        self.page = page.max(1);
        self
    }

    pub fn per_page(mut self, per_page: u64) -> Self {
        self.per_page = per_page.max(1);
        self
    }
}

/// Image entry as returned by the API; only the fields this crate reads
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Image {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub view_url: Option<String>,
}

/// Body shape required of every successful search response
#[derive(Debug, Deserialize)]
pub(crate) struct SearchBody {
    pub total: u64,
    pub images: Vec<Image>,
}

/// One page of search results
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPage {
    pub total: u64,
    /// Result pages at the requested page size
    pub pages: u64,
    pub images: Vec<Image>,
    /// Raw response body, kept for error reports
    pub raw_body: String,
}

impl SearchPage {
    pub(crate) fn from_body(body: SearchBody, per_page: u64, raw_body: String) -> Self {
        Self {
            total: body.total,
            pages: page_count(body.total, per_page),
            images: body.images,
            raw_body,
        }
    }
}

/// Number of pages needed to list `total` results at `per_page` each
pub fn page_count(total: u64, per_page: u64) -> u64 {
    total.div_ceil(per_page.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_count() {
        assert_eq!(page_count(37, 1), 37);
        assert_eq!(page_count(0, 1), 0);
        assert_eq!(page_count(1, 50), 1);
        assert_eq!(page_count(101, 50), 3);
        assert_eq!(page_count(100, 50), 2);
    }

    #[test]
    fn test_page_count_never_zero_with_results() {
        for total in 1..200 {
            for per_page in 1..60 {
                assert!(page_count(total, per_page) >= 1);
            }
        }
    }

    #[test]
    fn test_query_builder_clamps() {
        let query = SearchQuery::new("safe", "").page(0).per_page(0);
        assert_eq!(query.page, 1);
        assert_eq!(query.per_page, 1);
    }

    #[test]
    fn test_image_optional_fields() {
        let body: SearchBody = serde_json::from_str(
            r#"{"total": 2, "images": [{"id": 7, "view_url": "https://x/7.png", "score": 300}, {}]}"#,
        )
        .unwrap();

        assert_eq!(body.images[0].id, Some(7));
        assert_eq!(body.images[1], Image { id: None, view_url: None });
    }

    #[test]
    fn test_body_requires_total_and_images() {
        assert!(serde_json::from_str::<SearchBody>(r#"{"images": []}"#).is_err());
        assert!(serde_json::from_str::<SearchBody>(r#"{"total": 3}"#).is_err());
    }
}
