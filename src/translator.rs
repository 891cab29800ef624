use crate::column_group::{ColumnArg, ColumnGroup};
use crate::error::{Error, Result};
use indexmap::IndexMap;

/// The output of [`translate`]: a concrete SQL string plus the bookkeeping
/// needed to turn named bindings into a positional argument vector.
///
/// Positions `[0, str_param_count)` are textual-substitution (`%v`)
/// parameters, in left-to-right order of appearance in `sql`; positions
/// `[str_param_count, total_param_count)` are bound (`?`) parameters, also
/// in left-to-right order. Every position is reachable from exactly one
/// name in `param_map`.
///
/// Immutable once built; cheap to share across connections via `Arc`.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslatedSql {
    pub sql: String,
    pub param_map: IndexMap<String, Vec<usize>>,
    pub str_param_count: usize,
    pub total_param_count: usize,
}

impl TranslatedSql {
    pub fn positions(&self, name: &str) -> Option<&[usize]> {
        self.param_map.get(name).map(|v| v.as_slice())
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
    Normal,
    Var,
    SingleQuote,
    DoubleQuote,
}

struct Scanner<'a> {
    groups: &'a IndexMap<String, ColumnGroup>,
    out: Vec<u8>,
    str_param_map: IndexMap<String, Vec<usize>>,
    bound_param_map: IndexMap<String, Vec<usize>>,
    str_count: usize,
    bound_count: usize,
}

impl<'a> Scanner<'a> {
    fn new(groups: &'a IndexMap<String, ColumnGroup>) -> Self {
        Scanner {
            groups,
            out: Vec::new(),
            str_param_map: IndexMap::new(),
            bound_param_map: IndexMap::new(),
            str_count: 0,
            bound_count: 0,
        }
    }

    fn push_str_param(&mut self, name: &str) {
        let pos = self.str_count;
        self.str_count += 1;
        self.str_param_map
            .entry(name.to_string())
            .or_default()
            .push(pos);
    }

    fn push_bound_param(&mut self, name: &str) {
        let pos = self.bound_count;
        self.bound_count += 1;
        self.bound_param_map
            .entry(name.to_string())
            .or_default()
            .push(pos);
    }

    fn group(&self, group_name: &str) -> Result<&ColumnGroup> {
        self.groups
            .get(group_name)
            .ok_or_else(|| Error::programmer(format!("unknown column group {group_name:?}")))
    }

    fn expand(&mut self, name: &str) -> Result<()> {
        if let Some(group_name) = name.strip_prefix("BATCH_INSERT_") {
            let group = self.group(group_name)?.clone();
            self.expand_batch_insert(&group)
        } else if let Some(group_name) = name.strip_prefix("INSERT_") {
            let group = self.group(group_name)?.clone();
            self.expand_insert(&group)
        } else if let Some(group_name) = name.strip_prefix("UPDATE_") {
            let group = self.group(group_name)?.clone();
            self.expand_update(&group)
        } else if let Some(group_name) = name.strip_prefix("SELECT_") {
            let group = self.group(group_name)?.clone();
            self.expand_select(&group);
            Ok(())
        } else if let Some(group_name) = name.strip_prefix("HINT_") {
            let group = self.group(group_name)?.clone();
            self.expand_hint(&group);
            Ok(())
        } else if name.starts_with("STR_") {
            self.out.extend_from_slice(b"%v");
            self.push_str_param(name);
            Ok(())
        } else {
            let first = name.chars().next().ok_or_else(|| {
                Error::programmer("empty parameter name after ':'".to_string())
            })?;
            if !first.is_ascii_lowercase() {
                return Err(Error::programmer(format!(
                    "parameter name {name:?} must start with a lowercase letter"
                )));
            }
            self.out.push(b'?');
            self.push_bound_param(name);
            Ok(())
        }
    }

    fn expand_select(&mut self, group: &ColumnGroup) {
        self.out
            .extend_from_slice(group.columns.join(", ").as_bytes());
    }

    fn expand_insert(&mut self, group: &ColumnGroup) -> Result<()> {
        let cols = group.columns.join(", ");
        let placeholders = vec!["?"; group.columns.len()].join(", ");
        self.out
            .extend_from_slice(format!("({cols}) VALUES ({placeholders})").as_bytes());
        for col in &group.columns {
            self.push_bound_param(col);
        }
        Ok(())
    }

    fn expand_update(&mut self, group: &ColumnGroup) -> Result<()> {
        let assignments: Vec<String> = group.columns.iter().map(|c| format!("{c}=?")).collect();
        self.out.extend_from_slice(assignments.join(", ").as_bytes());
        for col in &group.columns {
            self.push_bound_param(col);
        }
        Ok(())
    }

    fn expand_hint(&mut self, group: &ColumnGroup) {
        let pairs: Vec<String> = group
            .columns
            .iter()
            .map(|c| format!("\"{c}\":\"%v\""))
            .collect();
        self.out
            .extend_from_slice(format!("/*{{{}}}*/", pairs.join(",")).as_bytes());
        for col in &group.columns {
            self.push_str_param(col);
        }
    }

    fn expand_batch_insert(&mut self, group: &ColumnGroup) -> Result<()> {
        let cols = group.columns.join(", ");
        let tuple = format!("({})", vec!["?"; group.columns.len()].join(", "));
        let tuples = vec![tuple; group.batch_insert_rows_count].join(", ");
        self.out
            .extend_from_slice(format!("({cols}) VALUES {tuples}").as_bytes());
        for _row in 0..group.batch_insert_rows_count {
            for col in &group.columns {
                self.push_bound_param(col);
            }
        }
        Ok(())
    }

    fn finish(mut self) -> Result<TranslatedSql> {
        let str_count = self.str_count;
        let mut param_map = std::mem::take(&mut self.str_param_map);
        for (name, positions) in self.bound_param_map {
            let shifted = positions.into_iter().map(|p| p + str_count);
            param_map.entry(name).or_default().extend(shifted);
        }
        Ok(TranslatedSql {
            sql: String::from_utf8(self.out)
                .expect("scanner only ever copies whole UTF-8 byte sequences"),
            param_map,
            str_param_count: str_count,
            total_param_count: str_count + self.bound_count,
        })
    }
}

/// Translate a SQL template containing `:name` placeholders and column-group
/// macros (`:SELECT_<group>`, `:INSERT_<group>`, `:UPDATE_<group>`,
/// `:BATCH_INSERT_<group>`, `:HINT_<group>`, `:STR_<name>`) into a concrete
/// [`TranslatedSql`].
///
/// Bare column names in `args` are collected into an implicit group named
/// `"COLUMNS"`; a fully formed [`ColumnGroup`] is registered under its own
/// name. `:name` inside a single- or double-quoted string literal is left
/// untouched, including backslash-escaped quotes.
pub fn translate<I, A>(template: &str, args: I) -> Result<TranslatedSql>
where
    I: IntoIterator<Item = A>,
    A: Into<ColumnArg>,
{
    let mut groups: IndexMap<String, ColumnGroup> = IndexMap::new();
    groups.insert("COLUMNS".to_string(), ColumnGroup::new("COLUMNS", Vec::new()));
    let mut default_columns: Vec<String> = Vec::new();
    for arg in args {
        match arg.into() {
            ColumnArg::Column(name) => default_columns.push(name),
            ColumnArg::Group(group) => {
                groups.insert(group.group.clone(), group);
            }
        }
    }
    if !default_columns.is_empty() {
        groups
            .entry("COLUMNS".to_string())
            .or_insert_with(|| ColumnGroup::new("COLUMNS", Vec::new()))
            .columns
            .extend(default_columns);
    }

    let mut scanner = Scanner::new(&groups);
    let mut state = State::Normal;
    let mut var_name = String::new();
    let bytes = template.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match state {
            State::Normal => match b {
                b':' => {
                    state = State::Var;
                    var_name.clear();
                    i += 1;
                }
                b'\'' => {
                    scanner.out.push(b);
                    state = State::SingleQuote;
                    i += 1;
                }
                b'"' => {
                    scanner.out.push(b);
                    state = State::DoubleQuote;
                    i += 1;
                }
                _ => {
                    scanner.out.push(b);
                    i += 1;
                }
            },
            State::Var => {
                let is_name_byte = b.is_ascii_alphanumeric() || b == b'_' || b == b'-';
                if is_name_byte {
                    var_name.push(b as char);
                    i += 1;
                } else {
                    scanner.expand(&var_name)?;
                    state = State::Normal;
                    // re-process this byte in Normal state
                }
            }
            State::SingleQuote => {
                if b == b'\\' && i + 1 < bytes.len() {
                    scanner.out.push(b);
                    scanner.out.push(bytes[i + 1]);
                    i += 2;
                } else if b == b'\'' {
                    scanner.out.push(b);
                    state = State::Normal;
                    i += 1;
                } else {
                    scanner.out.push(b);
                    i += 1;
                }
            }
            State::DoubleQuote => {
                if b == b'\\' && i + 1 < bytes.len() {
                    scanner.out.push(b);
                    scanner.out.push(bytes[i + 1]);
                    i += 2;
                } else if b == b'"' {
                    scanner.out.push(b);
                    state = State::Normal;
                    i += 1;
                } else {
                    scanner.out.push(b);
                    i += 1;
                }
            }
        }
    }
    if state == State::Var {
        scanner.expand(&var_name)?;
    }

    scanner.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column_group::batch_insert_columns;

    #[test]
    fn plain_named_parameters() {
        let ts = translate::<_, &str>(
            "SELECT * FROM account_010 WHERE passenger_id=:pid AND driver_id=:did",
            [],
        )
        .unwrap();
        assert_eq!(
            ts.sql,
            "SELECT * FROM account_010 WHERE passenger_id=? AND driver_id=?"
        );
        assert_eq!(ts.positions("pid"), Some(&[0][..]));
        assert_eq!(ts.positions("did"), Some(&[1][..]));
        assert_eq!(ts.str_param_count, 0);
        assert_eq!(ts.total_param_count, 2);
    }

    #[test]
    fn str_param_then_bound_params() {
        let ts = translate::<_, &str>(
            "SELECT * FROM account_:STR_district WHERE passenger_id=:pid AND driver_id=:did",
            [],
        )
        .unwrap();
        assert_eq!(
            ts.sql,
            "SELECT * FROM account_%v WHERE passenger_id=? AND driver_id=?"
        );
        assert_eq!(ts.positions("STR_district"), Some(&[0][..]));
        assert_eq!(ts.positions("pid"), Some(&[1][..]));
        assert_eq!(ts.positions("did"), Some(&[2][..]));
        assert_eq!(ts.str_param_count, 1);
    }

    #[test]
    fn update_columns_with_bare_column() {
        let ts = translate(
            "UPDATE account_:STR_district SET _modify_time=now(), :UPDATE_COLUMNS WHERE order_id=:oid",
            ["passenger_count"],
        )
        .unwrap();
        assert_eq!(
            ts.sql,
            "UPDATE account_%v SET _modify_time=now(), passenger_count=? WHERE order_id=?"
        );
        assert_eq!(ts.positions("STR_district"), Some(&[0][..]));
        assert_eq!(ts.positions("passenger_count"), Some(&[1][..]));
        assert_eq!(ts.positions("oid"), Some(&[2][..]));
        assert_eq!(ts.str_param_count, 1);
    }

    #[test]
    fn insert_columns_macro() {
        let ts = translate("INSERT test :INSERT_COLUMNS", ["name"]).unwrap();
        assert_eq!(ts.sql, "INSERT test (name) VALUES (?)");
        assert_eq!(ts.positions("name"), Some(&[0][..]));
        assert_eq!(ts.total_param_count, 1);
    }

    #[test]
    fn duplicate_name_accumulates_positions() {
        let ts = translate::<_, &str>(
            "SELECT * FROM account_010 WHERE passenger_id=:pid AND passenger_id=:pid",
            [],
        )
        .unwrap();
        assert_eq!(ts.positions("pid"), Some(&[0, 1][..]));
        assert_eq!(ts.total_param_count, 2);
    }

    #[test]
    fn quoted_colon_is_left_untouched() {
        let ts = translate::<_, &str>("SELECT * FROM t WHERE x=':pid'", []).unwrap();
        assert_eq!(ts.sql, "SELECT * FROM t WHERE x=':pid'");
        assert!(ts.param_map.is_empty());

        let ts = translate::<_, &str>("SELECT * FROM t WHERE x='\\':pid'", []).unwrap();
        assert_eq!(ts.sql, "SELECT * FROM t WHERE x='\\':pid'");
        assert!(ts.param_map.is_empty());
    }

    #[test]
    fn two_named_groups() {
        use crate::column_group::ColumnGroup;
        let ts = translate(
            ":INSERT_COLUMNS1 :INSERT_COLUMNS2",
            [
                ColumnGroup::new("COLUMNS1", vec!["a".into(), "b".into()]),
                ColumnGroup::new("COLUMNS2", vec!["c".into(), "d".into()]),
            ],
        )
        .unwrap();
        assert_eq!(ts.sql, "(a, b) VALUES (?, ?) (c, d) VALUES (?, ?)");
    }

    #[test]
    fn implicit_columns_group_is_present_even_with_no_bare_columns() {
        let ts = translate::<_, &str>("SELECT :SELECT_COLUMNS FROM t", []).unwrap();
        assert_eq!(ts.sql, "SELECT  FROM t");
        assert_eq!(ts.total_param_count, 0);

        let ts = translate::<_, &str>("INSERT t :INSERT_COLUMNS", []).unwrap();
        assert_eq!(ts.sql, "INSERT t () VALUES ()");
        assert_eq!(ts.total_param_count, 0);
    }

    #[test]
    fn hint_macro_uses_string_params() {
        let ts = translate(":HINT_COLUMNS", ["a", "b"]).unwrap();
        assert_eq!(ts.sql, r#"/*{"a":"%v","b":"%v"}*/"#);
        assert_eq!(ts.str_param_count, 2);
        assert_eq!(ts.positions("a"), Some(&[0][..]));
        assert_eq!(ts.positions("b"), Some(&[1][..]));
    }

    #[test]
    fn batch_insert_records_one_position_per_tuple() {
        let ts = translate(
            "INSERT account_event :BATCH_INSERT_COLUMNS",
            [batch_insert_columns(
                2,
                &["entity_id", "event_id", "event_name", "data"],
            )],
        )
        .unwrap();
        assert_eq!(
            ts.sql,
            "INSERT account_event (entity_id, event_id, event_name, data) VALUES (?, ?, ?, ?), (?, ?, ?, ?)"
        );
        assert_eq!(ts.positions("entity_id"), Some(&[0, 4][..]));
        assert_eq!(ts.positions("event_id"), Some(&[1, 5][..]));
        assert_eq!(ts.total_param_count, 8);
    }

    #[test]
    fn uppercase_parameter_name_is_a_programmer_error() {
        let err = translate::<_, &str>("SELECT * FROM t WHERE x=:Pid", []).unwrap_err();
        assert!(matches!(err, Error::Programmer(_)));
    }

    #[test]
    fn unknown_column_group_is_a_programmer_error() {
        let err = translate::<_, &str>("SELECT :SELECT_MISSING", []).unwrap_err();
        assert!(matches!(err, Error::Programmer(_)));
    }
}
