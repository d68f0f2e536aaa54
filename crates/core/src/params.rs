use std::collections::HashMap;

use url::Url;

/// Persistence strategy for filter fields that mirror into named string
/// params. The filter store never knows whether a field is URL-backed.
pub trait ParamStore: Send {
    fn get(&self, name: &str) -> Option<String>;
    fn set(&mut self, name: &str, value: &str);
    fn remove(&mut self, name: &str);
}

/// In-memory params for scopes that opt out of URL sync, e.g. a second
/// search panel on the same page.
#[derive(Debug, Default)]
pub struct MemoryParams {
    values: HashMap<String, String>,
}

impl MemoryParams {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ParamStore for MemoryParams {
    fn get(&self, name: &str) -> Option<String> {
        self.values.get(name).cloned()
    }

    fn set(&mut self, name: &str, value: &str) {
        self.values.insert(name.to_string(), value.to_string());
    }

    fn remove(&mut self, name: &str) {
        self.values.remove(name);
    }
}

/// Params mirrored into the query string of a URL. Removing the last
/// param drops the query string entirely, keeping the URL minimal.
#[derive(Debug, Clone)]
pub struct UrlParams {
    url: Url,
}

impl UrlParams {
    pub fn new(url: Url) -> Self {
        Self { url }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn into_url(self) -> Url {
        self.url
    }

    fn rewrite(&mut self, name: &str, value: Option<&str>) {
        let mut pairs: Vec<(String, String)> = self
            .url
            .query_pairs()
            .filter(|(key, _)| key != name)
            .map(|(key, val)| (key.into_owned(), val.into_owned()))
            .collect();

        if let Some(value) = value {
            pairs.push((name.to_string(), value.to_string()));
        }

        if pairs.is_empty() {
            self.url.set_query(None);
        } else {
            self.url
                .query_pairs_mut()
                .clear()
                .extend_pairs(pairs.iter().map(|(key, val)| (key.as_str(), val.as_str())));
        }
    }
}

impl ParamStore for UrlParams {
    fn get(&self, name: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    fn set(&mut self, name: &str, value: &str) {
        self.rewrite(name, Some(value));
    }

    fn remove(&mut self, name: &str) {
        self.rewrite(name, None);
    }
}
