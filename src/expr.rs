// ABOUTME: Expression tree produced by the parser, plus the variable-name walker

use regex::Regex;
use std::collections::HashSet;
use std::fmt;

/// Comparison operators usable between two terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl CmpOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Neq => "!=",
            CmpOp::Lt => "<",
            CmpOp::Lte => "<=",
            CmpOp::Gt => ">",
            CmpOp::Gte => ">=",
        }
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// A parsed condition. Immutable after parse; owned by the caller and safe
/// to evaluate any number of times, including concurrently.
#[derive(Debug, Clone)]
pub enum Expr {
    Bool(bool),
    Number(f64),
    Str(String),
    /// Compiled at parse time; the node owns the pattern for its lifetime
    Regex(Regex),
    List(Vec<Expr>),
    /// Dot-joined variable path resolved as a single flat key
    Var(String),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Xor(Box<Expr>, Box<Expr>),
    Nand(Box<Expr>, Box<Expr>),
    Cmp(CmpOp, Box<Expr>, Box<Expr>),
    In(Box<Expr>, Box<Expr>),
    NotIn(Box<Expr>, Box<Expr>),
    Has(Box<Expr>, Box<Expr>),
    Intersects(Box<Expr>, Box<Expr>),
    /// `=~`
    Match(Box<Expr>, Box<Expr>),
    /// `!~`
    NotMatch(Box<Expr>, Box<Expr>),
}

impl Expr {
    /// The set of variable paths referenced anywhere in the expression.
    /// Duplicates collapse; order is unspecified.
    pub fn variables(&self) -> HashSet<String> {
        let mut names = HashSet::new();
        self.collect_variables(&mut names);
        names
    }

    fn collect_variables(&self, names: &mut HashSet<String>) {
        match self {
            Expr::Var(path) => {
                names.insert(path.clone());
            }
            Expr::Bool(_) | Expr::Number(_) | Expr::Str(_) | Expr::Regex(_) => {}
            Expr::List(items) => {
                for item in items {
                    item.collect_variables(names);
                }
            }
            Expr::And(l, r)
            | Expr::Or(l, r)
            | Expr::Xor(l, r)
            | Expr::Nand(l, r)
            | Expr::In(l, r)
            | Expr::NotIn(l, r)
            | Expr::Has(l, r)
            | Expr::Intersects(l, r)
            | Expr::Match(l, r)
            | Expr::NotMatch(l, r) => {
                l.collect_variables(names);
                r.collect_variables(names);
            }
            Expr::Cmp(_, l, r) => {
                l.collect_variables(names);
                r.collect_variables(names);
            }
        }
    }

    /// Whether this node can produce a boolean. Bare variables pass since
    /// their type is only known at evaluation.
    pub(crate) fn is_boolean(&self) -> bool {
        !matches!(
            self,
            Expr::Number(_) | Expr::Str(_) | Expr::Regex(_) | Expr::List(_)
        )
    }
}

fn write_binary(f: &mut fmt::Formatter<'_>, op: &str, l: &Expr, r: &Expr) -> fmt::Result {
    write!(f, "({} {} {})", l, op, r)
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Bool(b) => write!(f, "{}", b),
            Expr::Number(n) => {
                // Whole numbers display without the trailing .0
                if n.fract() == 0.0 && n.is_finite() {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            Expr::Str(s) => write!(f, "\"{}\"", s),
            Expr::Regex(re) => write!(f, "/{}/", re.as_str()),
            Expr::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Expr::Var(path) => {
                for segment in path.split('.') {
                    write!(f, "[{}]", segment)?;
                }
                Ok(())
            }
            Expr::And(l, r) => write_binary(f, "AND", l, r),
            Expr::Or(l, r) => write_binary(f, "OR", l, r),
            Expr::Xor(l, r) => write_binary(f, "XOR", l, r),
            Expr::Nand(l, r) => write_binary(f, "NAND", l, r),
            Expr::Cmp(op, l, r) => write_binary(f, op.symbol(), l, r),
            Expr::In(l, r) => write_binary(f, "IN", l, r),
            Expr::NotIn(l, r) => write_binary(f, "NOT IN", l, r),
            Expr::Has(l, r) => write_binary(f, "HAS", l, r),
            Expr::Intersects(l, r) => write_binary(f, "INTERSECTS", l, r),
            Expr::Match(l, r) => write_binary(f, "=~", l, r),
            Expr::NotMatch(l, r) => write_binary(f, "!~", l, r),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variables_collects_dotted_paths() {
        let expr = Expr::Or(
            Box::new(Expr::And(
                Box::new(Expr::Var("@foo.a".to_string())),
                Box::new(Expr::Var("bar".to_string())),
            )),
            Box::new(Expr::Cmp(
                CmpOp::Gt,
                Box::new(Expr::Var("var9".to_string())),
                Box::new(Expr::Number(10.0)),
            )),
        );

        let names = expr.variables();
        assert_eq!(names.len(), 3);
        assert!(names.contains("@foo.a"));
        assert!(names.contains("bar"));
        assert!(names.contains("var9"));
        assert!(!names.contains("@foo"));
    }

    #[test]
    fn test_variables_collapses_duplicates() {
        let expr = Expr::And(
            Box::new(Expr::Var("x".to_string())),
            Box::new(Expr::Var("x".to_string())),
        );
        assert_eq!(expr.variables().len(), 1);
    }

    #[test]
    fn test_display_round_trips_surface_syntax() {
        let expr = Expr::And(
            Box::new(Expr::Cmp(
                CmpOp::Gt,
                Box::new(Expr::Var("foo.dfs".to_string())),
                Box::new(Expr::Number(10.0)),
            )),
            Box::new(Expr::Bool(true)),
        );
        assert_eq!(expr.to_string(), "(([foo][dfs] > 10) AND true)");
    }

    #[test]
    fn test_display_literals() {
        assert_eq!(Expr::Number(-75.4).to_string(), "-75.4");
        assert_eq!(Expr::Number(42.0).to_string(), "42");
        assert_eq!(Expr::Str("OFF".to_string()).to_string(), "\"OFF\"");
        let list = Expr::List(vec![
            Expr::Str("a".to_string()),
            Expr::Str("b".to_string()),
        ]);
        assert_eq!(list.to_string(), "[\"a\", \"b\"]");
    }

    #[test]
    fn test_tree_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Expr>();
    }

    #[test]
    fn test_boolean_shape() {
        assert!(Expr::Bool(true).is_boolean());
        assert!(Expr::Var("x".to_string()).is_boolean());
        assert!(!Expr::Number(1.0).is_boolean());
        assert!(!Expr::Str("x".to_string()).is_boolean());
        assert!(!Expr::List(vec![]).is_boolean());
    }
}
