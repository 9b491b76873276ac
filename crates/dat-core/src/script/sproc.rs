/// Extract the function name declared by a stored procedure script.
///
/// Looks for the first line of the form `create [or replace] function
/// name[.name]`, ignoring case and leading whitespace. Returns the possibly
/// schema-qualified name.
pub fn parse_sproc_name(body: &str) -> Option<String> {
    body.lines().find_map(declared_function)
}

fn declared_function(line: &str) -> Option<String> {
    let mut words = line.split_whitespace();
    if !words.next()?.eq_ignore_ascii_case("create") {
        return None;
    }

    let mut word = words.next()?;
    if word.eq_ignore_ascii_case("or") {
        if !words.next()?.eq_ignore_ascii_case("replace") {
            return None;
        }
        word = words.next()?;
    }
    if !word.eq_ignore_ascii_case("function") {
        return None;
    }

    let rest = words.next()?;
    let name: String = rest
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == '.')
        .collect();

    let mut parts = name.split('.');
    let valid = match (parts.next(), parts.next(), parts.next()) {
        (Some(a), None, None) => !a.is_empty(),
        (Some(a), Some(b), None) => !a.is_empty() && !b.is_empty(),
        _ => false,
    };
    valid.then_some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_function() {
        let body = "CREATE FUNCTION add_one(i int) RETURNS int AS $$ select i + 1 $$ LANGUAGE sql;";
        assert_eq!(parse_sproc_name(body), Some("add_one".to_string()));
    }

    #[test]
    fn test_schema_qualified_function() {
        let body = "-- helpers\n  create function api.user_by_id(id bigint)\nreturns setof users";
        assert_eq!(parse_sproc_name(body), Some("api.user_by_id".to_string()));
    }

    #[test]
    fn test_or_replace() {
        let body = "create or replace function touch()\nreturns trigger";
        assert_eq!(parse_sproc_name(body), Some("touch".to_string()));
    }

    #[test]
    fn test_no_function() {
        assert_eq!(parse_sproc_name("create table t (id int);"), None);
        assert_eq!(parse_sproc_name("select 'create function x()';"), None);
        assert_eq!(parse_sproc_name("create function (x int)"), None);
    }
}
