use serde::Deserialize;

/// SQL function that lowercases its text argument, registered by `store::init_db`.
pub const FOLD: &str = "fold";

#[derive(Debug, Default, Clone, Deserialize)]
pub struct SearchFilters {
    pub title: Option<String>,
    pub category: Option<String>,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        present(&self.title).is_none() && present(&self.category).is_none()
    }
}

/// A WHERE clause plus the values bound to its numbered placeholders.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Predicate {
    pub clause: Option<String>,
    pub params: Vec<String>,
}

impl Predicate {
    pub fn build(filters: &SearchFilters) -> Self {
        let mut conditions = Vec::new();
        let mut params = Vec::new();

        if let Some(title) = present(&filters.title) {
            let slot = params.len() + 1;
            conditions.push(format!(
                "({FOLD}(title) LIKE {FOLD}(?{slot}) OR {FOLD}(description) LIKE {FOLD}(?{slot}))"
            ));
            params.push(wildcard(title));
        }

        if let Some(category) = present(&filters.category) {
            let slot = params.len() + 1;
            conditions.push(format!("{FOLD}(category) LIKE {FOLD}(?{slot})"));
            params.push(wildcard(category));
        }

        let clause = if conditions.is_empty() {
            None
        } else {
            Some(conditions.join(" AND "))
        };

        Predicate { clause, params }
    }

    pub fn apply(&self, base: &str) -> String {
        match &self.clause {
            Some(clause) => format!("{base} WHERE {clause}"),
            None => base.to_string(),
        }
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|value| !value.is_empty())
}

fn wildcard(value: &str) -> String {
    format!("%{value}%")
}
