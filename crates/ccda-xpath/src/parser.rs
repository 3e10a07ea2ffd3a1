//! Parser for location expressions, built with `chumsky` directly over the
//! source characters.
//!
//! Grammar (a subset of XPath 1.0):
//!
//! ```text
//! Expr         := AndExpr ('or' AndExpr)*
//! AndExpr      := EqualityExpr ('and' EqualityExpr)*
//! EqualityExpr := RelationalExpr (('=' | '!=') RelationalExpr)*
//! RelationalExpr := UnionExpr (('<' | '<=' | '>' | '>=') UnionExpr)*
//! UnionExpr    := PathExpr ('|' PathExpr)*
//! PathExpr     := FilterExpr (('/' | '//') RelativePath)? | LocationPath
//! FilterExpr   := Primary Predicate*
//! Primary      := '(' Expr ')' | Literal | Number | FunctionCall
//! LocationPath := '//' RelativePath | '/' RelativePath? | RelativePath
//! RelativePath := Step (('/' | '//') Step)*
//! Step         := ('..' | '.' | ('@' | AxisName '::')? NodeTest) Predicate*
//! ```
//!
//! Whitespace between tokens is ignored. Function names and argument
//! counts are checked after parsing, so they surface as
//! [`QueryError::UnknownFunction`] and [`QueryError::Arity`] rather than as
//! syntax errors.

use chumsky::prelude::*;

use crate::ast::{Axis, CompareOp, Expr, LocationPath, NodeTest, Step};
use crate::error::{QueryError, Result};

type Extra<'src> = extra::Err<Rich<'src, char>>;

/// Functions the evaluator provides, with their accepted argument counts.
const FUNCTIONS: &[(&str, usize, usize)] = &[
    ("not", 1, 1),
    ("true", 0, 0),
    ("false", 0, 0),
    ("count", 1, 1),
    ("string", 0, 1),
    ("contains", 2, 2),
    ("starts-with", 2, 2),
    ("normalize-space", 0, 1),
    ("position", 0, 0),
    ("last", 0, 0),
    ("local-name", 0, 1),
];

/// Parses an expression into an AST.
pub fn parse(source: &str) -> Result<Expr> {
    let expr = expression()
        .padded()
        .then_ignore(end())
        .parse(source)
        .into_result()
        .map_err(|errors| match errors.into_iter().next() {
            Some(error) => QueryError::syntax(error.span().start, error.to_string()),
            None => QueryError::syntax(0, "invalid expression"),
        })?;
    check_functions(&expr)?;
    Ok(expr)
}

fn is_name_start(c: &char) -> bool {
    c.is_alphabetic() || *c == '_'
}

fn is_name_char(c: &char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.')
}

/// An NCName: no colon, may contain `-` and `.` after the first character.
fn ncname<'src>() -> impl Parser<'src, &'src str, &'src str, Extra<'src>> + Clone {
    any()
        .filter(is_name_start)
        .then(any().filter(is_name_char).repeated())
        .to_slice()
}

/// A reserved word such as `and`, matched only as a whole name.
fn keyword<'src>(word: &'static str) -> impl Parser<'src, &'src str, (), Extra<'src>> + Clone {
    ncname()
        .filter(move |name: &&str| *name == word)
        .ignored()
        .padded()
}

fn op<'src>(symbol: &'static str) -> impl Parser<'src, &'src str, (), Extra<'src>> + Clone {
    just(symbol).ignored().padded()
}

fn literal<'src>() -> impl Parser<'src, &'src str, String, Extra<'src>> + Clone {
    choice((
        none_of('\'')
            .repeated()
            .to_slice()
            .delimited_by(just('\''), just('\'')),
        none_of('"')
            .repeated()
            .to_slice()
            .delimited_by(just('"'), just('"')),
    ))
    .map(str::to_string)
    .labelled("literal")
}

/// `2`, `2.5`, `2.` and `.5`.
fn number<'src>() -> impl Parser<'src, &'src str, f64, Extra<'src>> + Clone {
    let digits = any().filter(char::is_ascii_digit).repeated().at_least(1);
    choice((
        digits
            .clone()
            .then(just('.').then(digits.clone().or_not()).or_not())
            .to_slice(),
        just('.').then(digits).to_slice(),
    ))
    .try_map(|text: &str, span| {
        text.parse::<f64>()
            .map_err(|_| Rich::custom(span, format!("invalid number '{}'", text)))
    })
    .labelled("number")
}

/// `text()`, `node()`, `*`, `name`, `prefix:name` or `prefix:*`.
fn node_test<'src>() -> impl Parser<'src, &'src str, NodeTest, Extra<'src>> + Clone {
    let empty_parens = op("(").then(op(")"));
    let node_type = choice((
        keyword("text").then(empty_parens.clone()).to(NodeTest::Text),
        keyword("node").then(empty_parens).to(NodeTest::Node),
    ));
    let local = choice((ncname(), just('*').to_slice()));
    let qname = ncname()
        .then(
            just(':')
                .then(just(':').not())
                .ignore_then(local)
                .or_not(),
        )
        .map(|(first, local)| match local {
            Some(local) => NodeTest::qualified(Some(first), local),
            None => NodeTest::qualified(None, first),
        });
    let star = just('*').to(NodeTest::Wildcard { prefix: None });
    choice((node_type, qname, star)).padded().labelled("node test")
}

fn axis<'src>() -> impl Parser<'src, &'src str, Axis, Extra<'src>> + Clone {
    ncname()
        .then_ignore(just("::"))
        .try_map(|name: &str, span| {
            Axis::from_name(name)
                .ok_or_else(|| Rich::custom(span, format!("unsupported axis '{}'", name)))
        })
        .padded()
}

/// Appends `steps` to `head`, expanding a leading `//` first.
fn join_steps(mut head: Vec<Step>, deep: bool, steps: Vec<Step>) -> Vec<Step> {
    if deep {
        head.push(Step::descendant_or_self());
    }
    head.extend(steps);
    head
}

fn expression<'src>() -> impl Parser<'src, &'src str, Expr, Extra<'src>> + Clone {
    recursive(|expr| {
        let predicates = expr
            .clone()
            .delimited_by(op("["), op("]"))
            .repeated()
            .collect::<Vec<_>>();

        let step = choice((
            op("..").to(Step::new(Axis::Parent, NodeTest::Node)),
            op(".").to(Step::new(Axis::SelfNode, NodeTest::Node)),
            op("@")
                .ignore_then(node_test())
                .map(|test| Step::new(Axis::Attribute, test)),
            axis().then(node_test()).map(|(axis, test)| Step::new(axis, test)),
            node_test().map(|test| Step::new(Axis::Child, test)),
        ))
        .then(predicates.clone())
        .map(|(mut step, predicates)| {
            step.predicates = predicates;
            step
        })
        .boxed();

        let separator = choice((op("//").to(true), op("/").to(false)));

        let relative = step
            .clone()
            .then(separator.clone().then(step).repeated().collect::<Vec<_>>())
            .map(|(first, rest)| {
                rest.into_iter()
                    .fold(vec![first], |steps, (deep, step)| {
                        join_steps(steps, deep, vec![step])
                    })
            })
            .boxed();

        let location_path = choice((
            op("//")
                .ignore_then(relative.clone())
                .map(|steps| LocationPath {
                    absolute: true,
                    steps: join_steps(Vec::new(), true, steps),
                }),
            op("/")
                .ignore_then(relative.clone().or_not())
                .map(|steps| LocationPath {
                    absolute: true,
                    steps: steps.unwrap_or_default(),
                }),
            relative.clone().map(|steps| LocationPath {
                absolute: false,
                steps,
            }),
        ));

        let arguments = expr
            .clone()
            .separated_by(op(","))
            .collect::<Vec<_>>()
            .delimited_by(op("("), op(")"));
        let function = ncname()
            .filter(|name: &&str| *name != "text" && *name != "node")
            .padded()
            .then(arguments)
            .map(|(name, args)| Expr::Function {
                name: name.to_string(),
                args,
            });

        let primary = choice((
            expr.clone().delimited_by(op("("), op(")")),
            literal().padded().map(Expr::Literal),
            number().padded().map(Expr::Number),
            function,
        ));

        let filter = primary.then(predicates).map(|(base, predicates)| {
            if predicates.is_empty() {
                base
            } else {
                Expr::Filter {
                    base: Box::new(base),
                    predicates,
                }
            }
        });

        let filter_path = filter
            .then(separator.then(relative).or_not())
            .map(|(base, rest)| match rest {
                Some((deep, steps)) => Expr::PathFrom {
                    base: Box::new(base),
                    steps: join_steps(Vec::new(), deep, steps),
                },
                None => base,
            });

        let path_expr = choice((filter_path, location_path.map(Expr::Path))).boxed();

        let union = path_expr.clone().foldl(
            op("|").ignore_then(path_expr).repeated(),
            |left, right| Expr::Union(Box::new(left), Box::new(right)),
        );

        let relational_op = choice((
            op("<=").to(CompareOp::LtEq),
            op(">=").to(CompareOp::GtEq),
            op("<").to(CompareOp::Lt),
            op(">").to(CompareOp::Gt),
        ));
        let relational = union
            .clone()
            .foldl(relational_op.then(union).repeated(), compare)
            .boxed();

        let equality_op = choice((op("!=").to(CompareOp::NotEq), op("=").to(CompareOp::Eq)));
        let equality = relational
            .clone()
            .foldl(equality_op.then(relational).repeated(), compare)
            .boxed();

        let and = equality.clone().foldl(
            keyword("and").ignore_then(equality).repeated(),
            |left, right| Expr::And(Box::new(left), Box::new(right)),
        );

        and.clone()
            .foldl(keyword("or").ignore_then(and).repeated(), |left, right| {
                Expr::Or(Box::new(left), Box::new(right))
            })
            .boxed()
    })
}

fn compare(left: Expr, (op, right): (CompareOp, Expr)) -> Expr {
    Expr::Compare(Box::new(left), op, Box::new(right))
}

/// Rejects calls to unknown functions and calls with the wrong number of
/// arguments, anywhere in the tree.
fn check_functions(expr: &Expr) -> Result<()> {
    match expr {
        Expr::Or(left, right)
        | Expr::And(left, right)
        | Expr::Compare(left, _, right)
        | Expr::Union(left, right) => {
            check_functions(left)?;
            check_functions(right)
        }
        Expr::Path(path) => check_steps(&path.steps),
        Expr::Filter { base, predicates } => {
            check_functions(base)?;
            predicates.iter().try_for_each(check_functions)
        }
        Expr::PathFrom { base, steps } => {
            check_functions(base)?;
            check_steps(steps)
        }
        Expr::Function { name, args } => {
            check_function(name, args.len())?;
            args.iter().try_for_each(check_functions)
        }
        Expr::Literal(_) | Expr::Number(_) => Ok(()),
    }
}

fn check_steps(steps: &[Step]) -> Result<()> {
    steps
        .iter()
        .flat_map(|step| &step.predicates)
        .try_for_each(check_functions)
}

fn check_function(name: &str, found: usize) -> Result<()> {
    let (_, min, max) = FUNCTIONS
        .iter()
        .find(|(n, _, _)| *n == name)
        .ok_or_else(|| QueryError::UnknownFunction {
            name: name.to_string(),
        })?;
    if found < *min || found > *max {
        let expected = if min == max {
            min.to_string()
        } else {
            format!("{}..{}", min, max)
        };
        return Err(QueryError::Arity {
            name: name.to_string(),
            expected,
            found,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(prefix: Option<&str>, local: &str) -> NodeTest {
        NodeTest::Name {
            prefix: prefix.map(str::to_string),
            local: local.to_string(),
        }
    }

    fn path(source: &str) -> LocationPath {
        match parse(source).unwrap() {
            Expr::Path(path) => path,
            other => panic!("expected a location path, got {:?}", other),
        }
    }

    #[test]
    fn test_relative_path_with_attribute() {
        let expr = parse("h:low/@value").unwrap();
        assert_eq!(
            expr,
            Expr::Path(LocationPath {
                absolute: false,
                steps: vec![
                    Step::new(Axis::Child, name(Some("h"), "low")),
                    Step::new(Axis::Attribute, name(None, "value")),
                ],
            })
        );
    }

    #[test]
    fn test_absolute_descendant_path() {
        let path = path("//h:recordTarget/h:patientRole");
        assert!(path.absolute);
        assert_eq!(path.steps.len(), 3);
        assert_eq!(path.steps[0], Step::descendant_or_self());
    }

    #[test]
    fn test_root_path() {
        let path = path("/");
        assert!(path.absolute);
        assert!(path.steps.is_empty());
    }

    #[test]
    fn test_template_predicate_then_parent() {
        let path = path(".//h:templateId[@root='2.16.840.1.113883.10.20.22.4.27']/..");
        assert_eq!(path.steps.len(), 4);
        assert_eq!(path.steps[0], Step::new(Axis::SelfNode, NodeTest::Node));
        assert_eq!(path.steps[1], Step::descendant_or_self());
        assert_eq!(path.steps[2].test, name(Some("h"), "templateId"));
        assert_eq!(
            path.steps[2].predicates,
            vec![Expr::Compare(
                Box::new(Expr::Path(LocationPath {
                    absolute: false,
                    steps: vec![Step::new(Axis::Attribute, name(None, "root"))],
                })),
                CompareOp::Eq,
                Box::new(Expr::Literal("2.16.840.1.113883.10.20.22.4.27".to_string())),
            )]
        );
        assert_eq!(path.steps[3], Step::new(Axis::Parent, NodeTest::Node));
    }

    #[test]
    fn test_axis_and_prefixed_wildcard() {
        let path = path("descendant::h:*");
        assert_eq!(path.steps[0].axis, Axis::Descendant);
        assert_eq!(
            path.steps[0].test,
            NodeTest::Wildcard {
                prefix: Some("h".to_string())
            }
        );
    }

    #[test]
    fn test_numbers_and_comparisons() {
        let expr = parse("count(h:id) >= 2.5 != .5").unwrap();
        let Expr::Compare(left, CompareOp::NotEq, right) = expr else {
            panic!("expected '!=' at the top");
        };
        assert_eq!(*right, Expr::Number(0.5));
        let Expr::Compare(count, CompareOp::GtEq, threshold) = *left else {
            panic!("expected '>=' on the left");
        };
        assert!(matches!(*count, Expr::Function { ref name, .. } if name == "count"));
        assert_eq!(*threshold, Expr::Number(2.5));
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let expr = parse("count(h:a) > 2 and true() or false()").unwrap();
        let Expr::Or(left, right) = expr else {
            panic!("expected 'or' at the top");
        };
        assert!(matches!(*left, Expr::And(_, _)));
        assert!(matches!(*right, Expr::Function { ref name, .. } if name == "false"));
    }

    #[test]
    fn test_keyword_prefix_is_a_name() {
        let path = path("h:x[order]");
        assert_eq!(
            path.steps[0].predicates,
            vec![Expr::Path(LocationPath {
                absolute: false,
                steps: vec![Step::new(Axis::Child, name(None, "order"))],
            })]
        );
    }

    #[test]
    fn test_positional_predicates() {
        let descendant = path("//h:a[1]");
        assert_eq!(descendant.steps[1].predicates, vec![Expr::Number(1.0)]);

        let Expr::Filter { base, predicates } = parse("(//h:a)[last()]").unwrap() else {
            panic!("expected a filter");
        };
        assert!(matches!(*base, Expr::Path(_)));
        assert_eq!(
            predicates,
            vec![Expr::Function {
                name: "last".to_string(),
                args: Vec::new(),
            }]
        );
    }

    #[test]
    fn test_filter_with_path_continuation() {
        let expr = parse("(.//h:templateId[@root='1.2']/..)[@moodCode='EVN']/h:value").unwrap();
        let Expr::PathFrom { base, steps } = expr else {
            panic!("expected a path continuation");
        };
        assert!(matches!(*base, Expr::Filter { .. }));
        assert_eq!(steps, vec![Step::new(Axis::Child, name(Some("h"), "value"))]);
    }

    #[test]
    fn test_union_of_negation_filters() {
        let expr = parse("(a)[@negationInd='false'] | (a)[not(@negationInd)]").unwrap();
        assert!(matches!(expr, Expr::Union(_, _)));
    }

    #[test]
    fn test_or_inside_predicate() {
        let path = path("h:x[@moodCode='EVN' or @moodCode='INT']");
        assert!(matches!(path.steps[0].predicates[0], Expr::Or(_, _)));
    }

    #[test]
    fn test_text_node_test() {
        let path = path("h:lotNumberText/text()");
        assert_eq!(path.steps[1].test, NodeTest::Text);
    }

    #[test]
    fn test_whitespace_is_ignored() {
        assert_eq!(
            parse(" h:x [ @a = 'b' ] / h:y ").unwrap(),
            parse("h:x[@a='b']/h:y").unwrap()
        );
    }

    #[test]
    fn test_unknown_function() {
        assert!(matches!(
            parse("frobnicate(.)"),
            Err(QueryError::UnknownFunction { .. })
        ));
    }

    #[test]
    fn test_unknown_function_in_predicate() {
        assert!(matches!(
            parse("h:x[frobnicate(.)]"),
            Err(QueryError::UnknownFunction { .. })
        ));
    }

    #[test]
    fn test_wrong_arity() {
        assert_eq!(
            parse("not()"),
            Err(QueryError::Arity {
                name: "not".to_string(),
                expected: "1".to_string(),
                found: 0,
            })
        );
    }

    #[test]
    fn test_trailing_garbage() {
        assert!(matches!(parse("h:id ]"), Err(QueryError::Syntax { .. })));
    }

    #[test]
    fn test_unterminated_literal() {
        assert!(matches!(parse("@root='abc"), Err(QueryError::Syntax { .. })));
    }

    #[test]
    fn test_unexpected_character() {
        assert!(matches!(parse("h:id # 1"), Err(QueryError::Syntax { .. })));
    }

    #[test]
    fn test_unsupported_axis() {
        assert!(parse("following::h:id").is_err());
    }
}
