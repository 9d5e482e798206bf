use serde_json::{json, Map, Value};

use super::error::FilterError;
use super::types::FilterOp;

/// A backend filter expression: field comparisons composed with and/or/not.
///
/// Renders to the collection filter shape `{field: {op: value}}`,
/// `{and: [...]}`, `{or: [...]}`, `{not: {...}}`.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterWhere {
    Field { column: String, op: FilterOp, value: Value },
    And(Vec<FilterWhere>),
    Or(Vec<FilterWhere>),
    Not(Box<FilterWhere>),
}

impl FilterWhere {
    pub fn field(column: impl Into<String>, op: FilterOp, value: Value) -> Result<Self, FilterError> {
        let column = column.into();
        Self::validate_column(&column)?;
        Self::validate_operator_data(op, &value)?;
        Ok(FilterWhere::Field { column, op, value })
    }

    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        FilterWhere::Field { column: column.into(), op: FilterOp::Eq, value: value.into() }
    }

    /// Case-insensitive substring match. LIKE wildcards in `term` match literally.
    pub fn contains(column: impl Into<String>, term: &str) -> Self {
        FilterWhere::Field {
            column: column.into(),
            op: FilterOp::Ilike,
            value: Value::String(format!("%{}%", escape_like(term))),
        }
    }

    /// Conjunction that flattens nested `And`s so the rendered filter stays shallow
    pub fn and(self, other: FilterWhere) -> FilterWhere {
        let mut parts = match self {
            FilterWhere::And(parts) => parts,
            single => vec![single],
        };
        match other {
            FilterWhere::And(more) => parts.extend(more),
            single => parts.push(single),
        }
        FilterWhere::And(parts)
    }

    pub fn to_graphql(&self) -> Value {
        match self {
            FilterWhere::Field { column, op, value } => {
                let mut inner = Map::new();
                inner.insert(op.as_str().to_string(), value.clone());
                let mut outer = Map::new();
                outer.insert(column.clone(), Value::Object(inner));
                Value::Object(outer)
            }
            FilterWhere::And(parts) => json!({ "and": parts.iter().map(|p| p.to_graphql()).collect::<Vec<_>>() }),
            FilterWhere::Or(parts) => json!({ "or": parts.iter().map(|p| p.to_graphql()).collect::<Vec<_>>() }),
            FilterWhere::Not(inner) => json!({ "not": inner.to_graphql() }),
        }
    }

    fn validate_column(name: &str) -> Result<(), FilterError> {
        let mut chars = name.chars();
        match chars.next() {
            Some(c) if c.is_alphabetic() || c == '_' => {}
            _ => return Err(FilterError::InvalidColumn(format!("Invalid column name format: {}", name))),
        }
        if !chars.all(|c| c.is_alphanumeric() || c == '_') {
            return Err(FilterError::InvalidColumn(format!("Invalid column name format: {}", name)));
        }
        Ok(())
    }

    fn validate_operator_data(op: FilterOp, value: &Value) -> Result<(), FilterError> {
        match op {
            FilterOp::In if !value.is_array() => {
                Err(FilterError::InvalidOperatorData("in requires an array".to_string()))
            }
            FilterOp::Is if !matches!(value.as_str(), Some("NULL") | Some("NOT_NULL")) => {
                Err(FilterError::InvalidOperatorData("is requires NULL or NOT_NULL".to_string()))
            }
            FilterOp::Like | FilterOp::Ilike if !value.is_string() => {
                Err(FilterError::InvalidOperatorData(format!("{} requires a string pattern", op.as_str())))
            }
            _ => Ok(()),
        }
    }
}

/// One `column:op:value` clause of a list filter, value still text.
///
/// Several clauses join with `;` and are and-ed together. `in` takes a
/// comma-separated list; `is` takes `null` or `not_null`.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterClause {
    pub column: String,
    pub op: FilterOp,
    pub raw: String,
}

impl FilterClause {
    pub fn parse_all(spec: &str) -> Result<Vec<FilterClause>, FilterError> {
        spec.split(';')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(Self::parse)
            .collect()
    }

    pub fn parse(clause: &str) -> Result<FilterClause, FilterError> {
        let mut parts = clause.splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(column), Some(op), Some(raw)) => Ok(FilterClause {
                column: column.trim().to_string(),
                op: op.trim().parse()?,
                raw: raw.to_string(),
            }),
            _ => Err(FilterError::InvalidOperatorData(format!("expected column:op:value, got '{}'", clause))),
        }
    }

    /// Build the condition, typing each value with `convert`. Patterns stay text.
    pub fn to_where<F>(&self, convert: F) -> Result<FilterWhere, FilterError>
    where
        F: Fn(&str) -> Result<Value, FilterError>,
    {
        let value = match self.op {
            FilterOp::In => Value::Array(
                self.raw
                    .split(',')
                    .map(|v| convert(v.trim()))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            FilterOp::Is => Value::String(self.raw.trim().to_ascii_uppercase()),
            FilterOp::Like | FilterOp::Ilike => Value::String(self.raw.clone()),
            _ => convert(&self.raw)?,
        };
        FilterWhere::field(self.column.as_str(), self.op, value)
    }
}

/// Escape LIKE metacharacters so user input matches literally
pub fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Evaluate a LIKE pattern (`%`, `_`, backslash escapes) against `text`
pub fn like_match(pattern: &str, text: &str, case_insensitive: bool) -> bool {
    #[derive(Clone, Copy, PartialEq)]
    enum Token {
        Any,
        One,
        Lit(char),
    }

    let fold = |c: char| if case_insensitive { c.to_lowercase().next().unwrap_or(c) } else { c };

    let mut tokens = Vec::new();
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '%' => tokens.push(Token::Any),
            '_' => tokens.push(Token::One),
            '\\' => tokens.push(Token::Lit(fold(chars.next().unwrap_or('\\')))),
            other => tokens.push(Token::Lit(fold(other))),
        }
    }
    let text: Vec<char> = text.chars().map(fold).collect();

    // Iterative wildcard match with single-star backtracking
    let (mut t, mut p) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;
    while t < text.len() {
        match tokens.get(p) {
            Some(Token::Lit(c)) if *c == text[t] => {
                t += 1;
                p += 1;
            }
            Some(Token::One) => {
                t += 1;
                p += 1;
            }
            Some(Token::Any) => {
                star = Some((p, t));
                p += 1;
            }
            _ => match star {
                Some((sp, st)) => {
                    p = sp + 1;
                    t = st + 1;
                    star = Some((sp, st + 1));
                }
                None => return false,
            },
        }
    }
    tokens[p..].iter().all(|tok| *tok == Token::Any)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_renders_ilike_substring() {
        let f = FilterWhere::contains("name", "land");
        assert_eq!(f.to_graphql(), json!({ "name": { "ilike": "%land%" } }));
    }

    #[test]
    fn contains_escapes_wildcards() {
        let f = FilterWhere::contains("name", "50%_off");
        assert_eq!(f.to_graphql(), json!({ "name": { "ilike": "%50\\%\\_off%" } }));
    }

    #[test]
    fn and_flattens() {
        let f = FilterWhere::eq("a", 1).and(FilterWhere::eq("b", 2)).and(FilterWhere::eq("c", 3));
        match &f {
            FilterWhere::And(parts) => assert_eq!(parts.len(), 3),
            other => panic!("expected And, got {:?}", other),
        }
        assert_eq!(
            f.to_graphql(),
            json!({ "and": [ { "a": { "eq": 1 } }, { "b": { "eq": 2 } }, { "c": { "eq": 3 } } ] })
        );
    }

    #[test]
    fn or_and_not_render() {
        let f = FilterWhere::Or(vec![
            FilterWhere::eq("status", "pending"),
            FilterWhere::Not(Box::new(FilterWhere::eq("active", true))),
        ]);
        assert_eq!(
            f.to_graphql(),
            json!({ "or": [ { "status": { "eq": "pending" } }, { "not": { "active": { "eq": true } } } ] })
        );
    }

    #[test]
    fn field_rejects_bad_column_and_operator_data() {
        assert!(matches!(
            FilterWhere::field("name; drop", FilterOp::Eq, json!("x")),
            Err(FilterError::InvalidColumn(_))
        ));
        assert!(matches!(
            FilterWhere::field("id", FilterOp::In, json!("x")),
            Err(FilterError::InvalidOperatorData(_))
        ));
        assert!(matches!(
            FilterWhere::field("city_id", FilterOp::Is, json!("EMPTY")),
            Err(FilterError::InvalidOperatorData(_))
        ));
        assert!(FilterWhere::field("city_id", FilterOp::Is, json!("NULL")).is_ok());
    }

    fn text(raw: &str) -> Result<Value, FilterError> {
        Ok(Value::String(raw.to_string()))
    }

    #[test]
    fn clauses_parse_and_render() {
        let clauses = FilterClause::parse_all("status:eq:pending; city_id:is:null ;").unwrap();
        assert_eq!(clauses.len(), 2);
        assert_eq!(clauses[0].op, FilterOp::Eq);
        assert_eq!(clauses[0].to_where(text).unwrap().to_graphql(), json!({ "status": { "eq": "pending" } }));
        assert_eq!(clauses[1].to_where(text).unwrap().to_graphql(), json!({ "city_id": { "is": "NULL" } }));

        let within = FilterClause::parse("status:in:pending, submitted").unwrap();
        assert_eq!(
            within.to_where(text).unwrap().to_graphql(),
            json!({ "status": { "in": ["pending", "submitted"] } })
        );

        // only the first two colons split
        let url = FilterClause::parse("website:eq:https://example.com").unwrap();
        assert_eq!(url.raw, "https://example.com");
    }

    #[test]
    fn bad_clauses_are_rejected() {
        assert!(matches!(FilterClause::parse("status:eq"), Err(FilterError::InvalidOperatorData(_))));
        assert!(matches!(
            FilterClause::parse("status:between:1"),
            Err(FilterError::UnsupportedOperator(op)) if op == "between"
        ));
        let clause = FilterClause::parse("name; drop:eq:x").unwrap();
        assert!(matches!(clause.to_where(text), Err(FilterError::InvalidColumn(_))));
        let clause = FilterClause::parse("city_id:is:empty").unwrap();
        assert!(matches!(clause.to_where(text), Err(FilterError::InvalidOperatorData(_))));
    }

    #[test]
    fn like_match_handles_wildcards_and_case() {
        assert!(like_match("%land%", "Testland", true));
        assert!(!like_match("%land%", "TestLAND", false));
        assert!(like_match("%LAND", "testland", true));
        assert!(like_match("T_st%", "Test", false));
        assert!(!like_match("T_st", "Toast", false));
        assert!(like_match("%", "", false));
        assert!(like_match("%a%b%", "xxaxxbxx", false));
    }

    #[test]
    fn like_match_respects_escapes() {
        let pattern = format!("%{}%", escape_like("50%"));
        assert!(like_match(&pattern, "save 50% now", true));
        assert!(!like_match(&pattern, "save 500 now", true));
    }
}
