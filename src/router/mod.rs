// Router module - maps a request path onto the route whose path_prefix is
// the longest match

use std::sync::Arc;

use crate::transform::TransformSettings;

/// One compiled route
#[derive(Debug, Clone)]
pub struct Route {
    pub path_prefix: String,
    pub settings: Arc<TransformSettings>,
}

pub struct Router {
    // Sorted by descending prefix length so the first hit is the longest
    routes: Vec<Route>,
}

impl Router {
    pub fn new(mut routes: Vec<Route>) -> Self {
        routes.sort_by(|a, b| b.path_prefix.len().cmp(&a.path_prefix.len()));
        Router { routes }
    }

    /// Find the route for `path`.
    ///
    /// A prefix matches on a segment boundary: `/img` matches `/img` and
    /// `/img/a.jpg` but not `/images/a.jpg`. A prefix ending in `/` matches
    /// everything below it.
    pub fn route(&self, path: &str) -> Option<&Route> {
        let path = normalize_path(path);
        self.routes
            .iter()
            .find(|route| prefix_matches(&route.path_prefix, &path))
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.routes.iter().map(|r| &r.path_prefix))
            .finish()
    }
}

/// Collapse repeated slashes (`//a///b.jpg` → `/a/b.jpg`).
fn normalize_path(path: &str) -> String {
    let mut normalized = String::with_capacity(path.len());
    let mut previous_slash = false;
    for c in path.chars() {
        if c == '/' {
            if previous_slash {
                continue;
            }
            previous_slash = true;
        } else {
            previous_slash = false;
        }
        normalized.push(c);
    }
    normalized
}

fn prefix_matches(prefix: &str, path: &str) -> bool {
    if !path.starts_with(prefix) {
        return false;
    }
    prefix.ends_with('/') || path.len() == prefix.len() || path[prefix.len()..].starts_with('/')
}
