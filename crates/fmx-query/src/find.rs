//! Wire-level find queries: ordered field constraints (implicit AND),
//! sort parameters, and the serialization into the web publishing
//! engine's request parameters.

use fmx_model::Connection;

/// Comparison operator on one constraint. Keyword names are what callers
/// suffix onto field paths; codes are what goes on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Op {
    #[default]
    Eq,
    Contains,
    StartsWith,
    EndsWith,
    Gt,
    Gte,
    Lt,
    Lte,
    Neq,
}

impl Op {
    /// Parse a keyword suffix (`exact`, `contains`, `gt`, ...).
    pub fn from_keyword(keyword: &str) -> Option<Op> {
        Some(match keyword {
            "exact" => Op::Eq,
            "contains" => Op::Contains,
            "startswith" => Op::StartsWith,
            "endswith" => Op::EndsWith,
            "gt" => Op::Gt,
            "gte" => Op::Gte,
            "lt" => Op::Lt,
            "lte" => Op::Lte,
            "neq" => Op::Neq,
            _ => return None,
        })
    }

    /// The `<field>.op` code the server expects.
    pub fn code(self) -> &'static str {
        match self {
            Op::Eq => "eq",
            Op::Contains => "cn",
            Op::StartsWith => "bw",
            Op::EndsWith => "ew",
            Op::Gt => "gt",
            Op::Gte => "gte",
            Op::Lt => "lt",
            Op::Lte => "lte",
            Op::Neq => "neq",
        }
    }
}

/// One `(field, operator, value)` triple, in wire field names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    pub field: String,
    pub op: Op,
    pub value: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Ascend,
    Descend,
}

impl SortOrder {
    pub fn as_wire(self) -> &'static str {
        match self {
            SortOrder::Ascend => "ascend",
            SortOrder::Descend => "descend",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortField {
    pub field: String,
    pub order: SortOrder,
}

/// Logical join of the constraints; the server defaults to AND.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

impl LogicalOp {
    pub fn as_wire(self) -> &'static str {
        match self {
            LogicalOp::And => "and",
            LogicalOp::Or => "or",
        }
    }
}

/// When the server runs a requested script relative to the find.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScriptTiming {
    /// After the find and sort complete.
    #[default]
    AfterFind,
    /// Before the find runs.
    Prefind,
    /// After the find, before the sort.
    Presort,
}

impl ScriptTiming {
    pub fn param(self) -> &'static str {
        match self {
            ScriptTiming::AfterFind => "-script",
            ScriptTiming::Prefind => "-script.prefind",
            ScriptTiming::Presort => "-script.presort",
        }
    }
}

/// A server-side script to run with the command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    pub name: String,
    pub timing: ScriptTiming,
}

/// The find command to issue. `-find` searches by criteria; `-findall`
/// returns the layout's whole record set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Find,
    FindAll,
}

impl Command {
    pub fn token(self) -> &'static str {
        match self {
            Command::Find => "-find",
            Command::FindAll => "-findall",
        }
    }
}

/// An ordered find query. Constraint order is preserved into the request;
/// the constraints join with implicit AND unless a logical operator
/// overrides it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindSpec {
    pub constraints: Vec<Constraint>,
    pub sorts: Vec<SortField>,
    pub logical_op: Option<LogicalOp>,
    pub max: Option<u32>,
    pub skip: Option<u32>,
    /// Target one record by its record id (`-recid`).
    pub record_id: Option<i64>,
    /// Expected modification id (`-modid`), for optimistic concurrency.
    pub mod_id: Option<i64>,
    pub script: Option<Script>,
}

impl FindSpec {
    pub fn push(&mut self, field: impl Into<String>, op: Op, value: impl Into<String>) {
        self.constraints.push(Constraint {
            field: field.into(),
            op,
            value: value.into(),
        });
    }

    pub fn push_sort(&mut self, field: impl Into<String>, order: SortOrder) {
        self.sorts.push(SortField {
            field: field.into(),
            order,
        });
    }

    /// Serialize into the ordered request parameters: database selection
    /// first, then constraints in declared order, sort fields by priority,
    /// the result window, and the trailing command token.
    pub fn to_params(&self, connection: &Connection, command: Command) -> Vec<(String, String)> {
        let mut params = Vec::new();
        params.push(("-db".to_string(), connection.database.clone()));
        params.push(("-lay".to_string(), connection.layout.clone()));
        if let Some(response_layout) = &connection.response_layout {
            params.push(("-lay.response".to_string(), response_layout.clone()));
        }
        if command == Command::Find {
            for constraint in &self.constraints {
                params.push((constraint.field.clone(), constraint.value.clone()));
                params.push((
                    format!("{}.op", constraint.field),
                    constraint.op.code().to_string(),
                ));
            }
            if let Some(op) = self.logical_op {
                params.push(("-lop".to_string(), op.as_wire().to_string()));
            }
        }
        for (priority, sort) in self.sorts.iter().enumerate() {
            params.push((format!("-sortfield.{priority}"), sort.field.clone()));
            params.push((
                format!("-sortorder.{priority}"),
                sort.order.as_wire().to_string(),
            ));
        }
        if let Some(max) = self.max {
            params.push(("-max".to_string(), max.to_string()));
        }
        if let Some(skip) = self.skip {
            params.push(("-skip".to_string(), skip.to_string()));
        }
        if let Some(record_id) = self.record_id {
            params.push(("-recid".to_string(), record_id.to_string()));
        }
        if let Some(mod_id) = self.mod_id {
            params.push(("-modid".to_string(), mod_id.to_string()));
        }
        if let Some(script) = &self.script {
            params.push((script.timing.param().to_string(), script.name.clone()));
        }
        params.push((command.token().to_string(), String::new()));
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection() -> Connection {
        Connection::new("https://fm.example.com", "cms", "articles")
            .response_layout("articles_api")
    }

    #[test]
    fn params_keep_declared_constraint_order() {
        let mut spec = FindSpec::default();
        spec.push("Title", Op::Contains, "rust");
        spec.push("zpk", Op::Gt, "10");
        spec.max = Some(50);

        let params = spec.to_params(&connection(), Command::Find);
        let keys: Vec<&str> = params.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "-db",
                "-lay",
                "-lay.response",
                "Title",
                "Title.op",
                "zpk",
                "zpk.op",
                "-max",
                "-find",
            ]
        );
        assert_eq!(params[3], ("Title".to_string(), "rust".to_string()));
        assert_eq!(params[4], ("Title.op".to_string(), "cn".to_string()));
        assert_eq!(params[6], ("zpk.op".to_string(), "gt".to_string()));
    }

    #[test]
    fn find_all_drops_constraints() {
        let mut spec = FindSpec::default();
        spec.push("Title", Op::Eq, "ignored");
        let params = spec.to_params(&connection(), Command::FindAll);
        assert!(params.iter().all(|(k, _)| k != "Title"));
        assert_eq!(params.last().unwrap().0, "-findall");
    }

    #[test]
    fn sort_fields_carry_priorities() {
        let mut spec = FindSpec::default();
        spec.push_sort("Title", SortOrder::Ascend);
        spec.push_sort("zpk", SortOrder::Descend);
        let params = spec.to_params(&connection(), Command::FindAll);
        assert!(params.contains(&("-sortfield.0".to_string(), "Title".to_string())));
        assert!(params.contains(&("-sortorder.0".to_string(), "ascend".to_string())));
        assert!(params.contains(&("-sortfield.1".to_string(), "zpk".to_string())));
        assert!(params.contains(&("-sortorder.1".to_string(), "descend".to_string())));
    }

    #[test]
    fn script_and_record_identity_params() {
        let mut spec = FindSpec::default();
        spec.record_id = Some(101);
        spec.mod_id = Some(3);
        spec.script = Some(Script {
            name: "Reindex".to_string(),
            timing: ScriptTiming::Prefind,
        });

        let params = spec.to_params(&connection(), Command::Find);
        assert!(params.contains(&("-recid".to_string(), "101".to_string())));
        assert!(params.contains(&("-modid".to_string(), "3".to_string())));
        assert!(params.contains(&("-script.prefind".to_string(), "Reindex".to_string())));

        assert_eq!(ScriptTiming::AfterFind.param(), "-script");
        assert_eq!(ScriptTiming::Presort.param(), "-script.presort");
    }

    #[test]
    fn operator_keywords_map_to_wire_codes() {
        assert_eq!(Op::from_keyword("contains"), Some(Op::Contains));
        assert_eq!(Op::from_keyword("startswith"), Some(Op::StartsWith));
        assert_eq!(Op::from_keyword("bogus"), None);
        assert_eq!(Op::StartsWith.code(), "bw");
        assert_eq!(Op::EndsWith.code(), "ew");
    }
}
