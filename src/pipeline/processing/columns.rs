//! Header binding for sources whose column names we do not control.
//!
//! A [`ColumnRule`] lists predicates in priority order. Binding evaluates
//! the first predicate against every header, then the next one, and so on;
//! the first header that satisfies a predicate wins.

/// A case- and accent-insensitive test on a header name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamePredicate {
    /// Header contains at least one of the fragments
    ContainsAny(Vec<String>),
    /// Header contains every fragment
    ContainsAll(Vec<String>),
    /// Header equals the name once trimmed
    Equals(String),
}

impl NamePredicate {
    pub fn any<S: AsRef<str>>(fragments: &[S]) -> Self {
        Self::ContainsAny(fragments.iter().map(|f| fold(f.as_ref())).collect())
    }

    pub fn all<S: AsRef<str>>(fragments: &[S]) -> Self {
        Self::ContainsAll(fragments.iter().map(|f| fold(f.as_ref())).collect())
    }

    pub fn equals(name: &str) -> Self {
        Self::Equals(fold(name))
    }

    pub fn matches(&self, header: &str) -> bool {
        let header = fold(header);
        match self {
            NamePredicate::ContainsAny(fragments) => fragments.iter().any(|f| header.contains(f.as_str())),
            NamePredicate::ContainsAll(fragments) => fragments.iter().all(|f| header.contains(f.as_str())),
            NamePredicate::Equals(name) => header == *name,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ColumnRule {
    pub field: &'static str,
    pub predicates: Vec<NamePredicate>,
}

impl ColumnRule {
    pub fn new(field: &'static str, predicates: Vec<NamePredicate>) -> Self {
        Self { field, predicates }
    }

    /// Index of the header bound to this rule, if any.
    pub fn bind(&self, headers: &[String]) -> Option<usize> {
        self.predicates
            .iter()
            .find_map(|predicate| headers.iter().position(|h| predicate.matches(h)))
    }
}

/// Lower-cases, trims and strips the Portuguese diacritics that show up in
/// header names ("Razão Social" -> "razao social").
pub fn fold(name: &str) -> String {
    name.trim()
        .chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
            'é' | 'ê' | 'è' => 'e',
            'í' | 'î' => 'i',
            'ó' | 'ô' | 'õ' | 'ö' => 'o',
            'ú' | 'ü' => 'u',
            'ç' => 'c',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_priority_beats_column_order() {
        let rule = ColumnRule::new(
            "registry_id",
            vec![
                NamePredicate::all(&["registro", "ans"]),
                NamePredicate::all(&["registro", "operadora"]),
                NamePredicate::any(&["registro"]),
            ],
        );
        let cols = headers(&["Data_Registro", "REGISTRO_OPERADORA", "Registro_ANS"]);
        assert_eq!(rule.bind(&cols), Some(2));

        let cols = headers(&["Data_Registro", "REGISTRO_OPERADORA"]);
        assert_eq!(rule.bind(&cols), Some(1));

        let cols = headers(&["Data_Registro", "CNPJ"]);
        assert_eq!(rule.bind(&cols), Some(0));
    }

    #[test]
    fn test_accents_and_case_are_ignored() {
        let rule = ColumnRule::new("legal_name", vec![NamePredicate::any(&["razao", "denominacao"])]);
        assert_eq!(rule.bind(&headers(&["CNPJ", " Razão Social "])), Some(1));
        assert_eq!(rule.bind(&headers(&["CNPJ", "Valor"])), None);
    }

    #[test]
    fn test_equals_is_not_a_substring_match() {
        let rule = ColumnRule::new("state", vec![NamePredicate::equals("UF")]);
        assert_eq!(rule.bind(&headers(&["Cidade_UF", "uf"])), Some(1));
        assert_eq!(rule.bind(&headers(&["Cidade_UF"])), None);
    }
}
