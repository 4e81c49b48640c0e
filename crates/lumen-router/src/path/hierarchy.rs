/// Walks a canonical path up to the root, yielding the path itself first.
///
/// ```
/// use lumen_router::path::PathHierarchy;
///
/// let chain: Vec<&str> = PathHierarchy::new("/todos/42/edit").collect();
/// assert_eq!(chain, vec!["/todos/42/edit", "/todos/42", "/todos", "/"]);
/// ```
#[derive(Debug, Clone)]
pub struct PathHierarchy<'a> {
    next: Option<&'a str>,
}

impl<'a> PathHierarchy<'a> {
    pub fn new(path: &'a str) -> Self {
        Self { next: Some(path) }
    }
}

impl<'a> Iterator for PathHierarchy<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let current = self.next?;
        self.next = match current.rfind('/') {
            _ if current == "/" || current.is_empty() => None,
            Some(0) => Some("/"),
            Some(idx) => Some(&current[..idx]),
            None => None,
        };
        Some(current)
    }
}
