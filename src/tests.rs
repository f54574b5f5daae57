use super::*;
use crate::config::MAX_INPUT_LEN;
use crate::error::{DomainError, DomainErrorKind, Unsolved};
use crate::expr::Function;
use crate::lex::{LexError, TokenKind};
use crate::parse::{ParseErrorKind, ParsedInput};

fn kinds(input: &str) -> Vec<TokenKind> {
    Lexer::new(None, input)
        .map(|token| token.expect("lexes").kind)
        .collect()
}

fn lex_error(input: &str) -> LexError {
    Lexer::new(None, input)
        .find_map(Result::err)
        .expect("lex error")
}

fn parse(input: &str) -> Result<ParsedInput, SolveError> {
    let normalized = lex::normalize(input);
    Parser::new(None, &normalized).with_variable("x").parse()
}

fn parsed(input: &str) -> Expr {
    parse(input).expect("parses").expr
}

fn parse_error(input: &str) -> ParseErrorKind {
    match parse(input) {
        Err(SolveError::Parse(e)) => e.kind.clone(),
        other => panic!("expected a parse error for {input:?}, got {other:?}"),
    }
}

fn simplified(input: &str) -> String {
    simplify::simplify(&parsed(input), &Limits::default())
        .expect("simplifies")
        .to_string()
}

fn solved(input: &str) -> SolutionSet {
    solve_set(input, "x", &Limits::default()).expect("solves")
}

fn int(n: i64) -> Expr {
    Expr::integer(n)
}

fn x() -> Expr {
    Expr::var("x")
}

// ====== NORMALIZER & LEXER TESTS ======

#[test]
fn test_normalize_caret() {
    assert_eq!(lex::normalize("x^2 + 3^x"), "x**2 + 3**x");
    assert_eq!(lex::normalize("2x + 1 = 3"), "2x + 1 = 3");
}

#[test]
fn test_lex_equation() {
    assert_eq!(
        kinds("2x + 3 = 7"),
        vec![
            TokenKind::Number(Number::integer(2)),
            TokenKind::Ident,
            TokenKind::Plus,
            TokenKind::Number(Number::integer(3)),
            TokenKind::Equal,
            TokenKind::Number(Number::integer(7)),
            TokenKind::End,
        ]
    );
}

#[test]
fn test_lex_power_forms() {
    let expected = vec![
        TokenKind::Ident,
        TokenKind::Power,
        TokenKind::Number(Number::integer(2)),
        TokenKind::End,
    ];
    assert_eq!(kinds("x**2"), expected);
    assert_eq!(kinds("x^2"), expected);
}

#[test]
fn test_lex_decimals_are_floats() {
    assert_eq!(kinds("2.5")[0], TokenKind::Number(Number::float(2.5)));
    assert_eq!(kinds(".5")[0], TokenKind::Number(Number::float(0.5)));
}

#[test]
fn test_lex_whitespace_only_is_end() {
    assert_eq!(kinds(" \t\n "), vec![TokenKind::End]);
}

#[test]
fn test_lex_unexpected_character() {
    let err = lex_error("2 $ 3");
    assert_eq!(err.token, '$');
    assert_eq!(err.offset(), 2);
    assert_eq!(err.to_string(), "Unexpected character '$'");
}

#[test]
fn test_lex_second_decimal_point() {
    let err = lex_error("1.2.3");
    assert_eq!(err.token, '.');
    assert_eq!(err.offset(), 3);
}

#[test]
fn test_lex_exponent_notation() {
    assert_eq!(kinds("1e5")[0], TokenKind::Number(Number::float(100000.0)));
    assert_eq!(kinds("2.5E-1")[0], TokenKind::Number(Number::float(0.25)));
    assert_eq!(kinds("3e+2")[0], TokenKind::Number(Number::float(300.0)));
    // without digits the `e` is a symbol
    assert_eq!(
        kinds("2e"),
        vec![
            TokenKind::Number(Number::integer(2)),
            TokenKind::Ident,
            TokenKind::End,
        ]
    );
}

#[test]
fn test_lex_error_points_into_user_text() {
    let err = Lexer::new(None, "x**$")
        .with_user_text("x^$")
        .find_map(Result::err)
        .expect("lex error");
    assert_eq!(err.offset(), 2);

    let Err(SolveError::Lex(e)) = solve("x^2 + $ = 1", "x") else {
        panic!("expected a lex error");
    };
    assert_eq!(e.offset(), 6);
}

#[test]
fn test_user_offset() {
    assert_eq!(lex::user_offset("x^2", 0), 0);
    assert_eq!(lex::user_offset("x^2", 1), 1);
    assert_eq!(lex::user_offset("x^2", 3), 2);
    assert_eq!(lex::user_offset("x^2", 4), 3);
    assert_eq!(lex::user_offset("2x", 1), 1);
}

#[test]
fn test_token_display() {
    let tokens: Vec<String> = Lexer::new(None, "2 * x")
        .map(|t| t.expect("lexes").to_string())
        .collect();
    assert_eq!(
        tokens,
        vec!["NUMBER 2 2", "STAR * null", "IDENTIFIER x null", "EOF  null"]
    );
}

// ====== PARSER TESTS ======

#[test]
fn test_parse_implicit_multiplication() {
    assert_eq!(parsed("2x"), Expr::Product(vec![int(2), x()]));
    assert_eq!(
        parsed("3(x+2)"),
        Expr::Product(vec![int(3), Expr::Sum(vec![x(), int(2)])])
    );
    assert_eq!(
        parsed("(x+1)(x-1)"),
        Expr::Product(vec![
            Expr::Sum(vec![x(), int(1)]),
            Expr::Sum(vec![x(), Expr::neg(int(1))]),
        ])
    );
}

#[test]
fn test_parse_implicit_binds_like_explicit() {
    // 2x^2 is 2*(x^2), and 1/2x is (1/2)*x
    assert_eq!(
        parsed("2x^2"),
        Expr::Product(vec![int(2), Expr::power(x(), int(2))])
    );
    assert_eq!(
        parsed("1/2x"),
        Expr::Product(vec![
            Expr::Product(vec![int(1), Expr::power(int(2), int(-1))]),
            x(),
        ])
    );
}

#[test]
fn test_parse_equation_is_difference() {
    let input = parse("2*x + 4 = 10").expect("parses");
    assert!(input.is_equation);
    assert_eq!(
        input.expr,
        Expr::difference(
            Expr::Sum(vec![Expr::Product(vec![int(2), x()]), int(4)]),
            int(10)
        )
    );
    assert_eq!(input.to_string(), "2*x + 4 - 10 = 0");

    let input = parse("2 + 2").expect("parses");
    assert!(!input.is_equation);
}

#[test]
fn test_parse_precedence() {
    assert_eq!(parsed("-x^2"), Expr::neg(Expr::power(x(), int(2))));
    assert_eq!(
        parsed("2^3^2"),
        Expr::power(int(2), Expr::power(int(3), int(2)))
    );
    assert_eq!(
        parsed("1 - 2 - 3"),
        Expr::Sum(vec![
            Expr::Sum(vec![int(1), Expr::neg(int(2))]),
            Expr::neg(int(3)),
        ])
    );
    assert_eq!(parsed("+x"), x());
}

#[test]
fn test_parse_symbols_and_constants() {
    assert_eq!(
        parsed("xy"),
        Expr::Product(vec![x(), Expr::var("y")])
    );
    assert_eq!(parsed("x2"), Expr::var("x2"));
    assert_eq!(parsed("I"), Expr::Const(Number::imaginary_unit()));
    assert_eq!(
        parsed("pi"),
        Expr::Const(Number::float(std::f64::consts::PI))
    );
}

#[test]
fn test_parse_split_symbols_keep_constants() {
    assert_eq!(
        parsed("2Ix"),
        Expr::Product(vec![
            int(2),
            Expr::Product(vec![Expr::Const(Number::imaginary_unit()), x()]),
        ])
    );
    assert_eq!(
        parsed("Ey"),
        Expr::Product(vec![
            Expr::Const(Number::float(std::f64::consts::E)),
            Expr::var("y"),
        ])
    );
}

#[test]
fn test_parse_target_variable_is_not_split() {
    let normalized = lex::normalize("ab + 1");
    let input = Parser::new(None, &normalized)
        .with_variable("ab")
        .parse()
        .expect("parses");
    assert_eq!(input.expr, Expr::Sum(vec![Expr::var("ab"), int(1)]));
}

#[test]
fn test_parse_functions() {
    assert_eq!(
        parsed("sin(x)"),
        Expr::Func(Function::Sin, Box::new(x()))
    );
    assert_eq!(
        parsed("sin x^2"),
        Expr::Func(Function::Sin, Box::new(Expr::power(x(), int(2))))
    );
    assert_eq!(
        parsed("ln(2)"),
        Expr::Func(Function::Log, Box::new(int(2)))
    );
}

#[test]
fn test_parse_errors() {
    assert_eq!(parse_error("(x + 1"), ParseErrorKind::UnclosedParen);
    assert_eq!(parse_error("x + 1)"), ParseErrorKind::UnexpectedClosingParen);
    assert_eq!(parse_error("x = 1 = 2"), ParseErrorKind::SecondEquals);
    assert_eq!(parse_error("x + * 2"), ParseErrorKind::MissingOperand);
    assert_eq!(parse_error("= 5"), ParseErrorKind::MissingOperand);
    assert_eq!(parse_error("x ="), ParseErrorKind::MissingOperand);
    assert_eq!(parse_error("()"), ParseErrorKind::MissingOperand);
    assert_eq!(
        parse_error("sin"),
        ParseErrorKind::BareFunction("sin".to_string())
    );
}

#[test]
fn test_parse_error_message_and_span() {
    let Err(SolveError::Parse(e)) = parse("x = 1 = 2") else {
        panic!("expected a parse error");
    };
    assert!(e.to_string().starts_with("Invalid equation syntax"));
    assert_eq!(e.offset(), 6);

    // after a caret the span still matches what was typed
    let Err(SolveError::Parse(e)) = solve("x^2 = 1 = 2", "x") else {
        panic!("expected a parse error");
    };
    assert_eq!(e.kind, ParseErrorKind::SecondEquals);
    assert_eq!(e.offset(), 8);
}

#[test]
fn test_parse_surfaces_lex_errors() {
    assert!(matches!(parse("x + #"), Err(SolveError::Lex(_))));
}

// ====== SIMPLIFIER TESTS ======

#[test]
fn test_simplify_identities() {
    assert_eq!(simplified("x + 0"), "x");
    assert_eq!(simplified("x * 1"), "x");
    assert_eq!(simplified("x * 0"), "0");
    assert_eq!(simplified("x - x"), "0");
    assert_eq!(simplified("x^0"), "1");
    assert_eq!(simplified("x^1"), "x");
}

#[test]
fn test_simplify_like_terms() {
    assert_eq!(simplified("x + x"), "2*x");
    assert_eq!(simplified("x*x*x"), "x^3");
    assert_eq!(simplified("3x - 5x + 2"), "-2*x + 2");
    assert_eq!(simplified("x*x^-1"), "1");
}

#[test]
fn test_simplify_expands_products() {
    assert_eq!(simplified("2*(x+3)"), "2*x + 6");
    assert_eq!(simplified("(x+1)(x-1)"), "x^2 - 1");
    assert_eq!(simplified("(x+1)^2"), "x^2 + 2*x + 1");
    assert_eq!(simplified("(x+1)(x+1)"), "x^2 + 2*x + 1");
}

#[test]
fn test_simplify_constant_folding() {
    assert_eq!(simplified("2 + 2"), "4");
    assert_eq!(simplified("1/2 + 1/3"), "5/6");
    assert_eq!(simplified("2^10"), "1024");
    assert_eq!(simplified("2^-2"), "1/4");
    assert_eq!(simplified("4^(1/2)"), "2");
    assert_eq!(simplified("(-4)^(1/2)"), "2i");
    assert_eq!(simplified("I^2"), "-1");
    assert_eq!(simplified("2.5 * 2"), "5");
    assert_eq!(simplified("0.1 + 0.2"), "0.30000000000000004");
}

#[test]
fn test_simplify_functions() {
    assert_eq!(simplified("sqrt(16)"), "4");
    assert_eq!(simplified("sqrt(2)"), "1.4142135623730951");
    assert_eq!(simplified("abs(-3)"), "3");
    assert_eq!(simplified("cos(0)"), "1");
    assert_eq!(simplified("sin(x)"), "sin(x)");
    assert_eq!(simplified("sin(pi)"), "0");
    assert_eq!(simplified("cos(pi)"), "-1");
    assert_eq!(simplified("sin(pi/2)"), "1");
}

#[test]
fn test_simplify_domain_errors() {
    let limits = Limits::default();
    let kind = |input: &str| {
        simplify::simplify(&parsed(input), &limits)
            .expect_err("domain error")
            .kind
    };
    assert_eq!(kind("1/0"), DomainErrorKind::DivisionByZero);
    assert_eq!(kind("x/(2 - 2)"), DomainErrorKind::DivisionByZero);
    assert_eq!(kind("log(0)"), DomainErrorKind::LogOfZero);
    assert_eq!(kind("10^4096*10^4096*1.0"), DomainErrorKind::Overflow);
    assert_eq!(kind("1e308 * 10"), DomainErrorKind::Overflow);
    assert_eq!(kind("1e400"), DomainErrorKind::Overflow);
    assert_eq!(kind("1e300x^2 * 1e300"), DomainErrorKind::Overflow);
}

#[test]
fn test_simplify_bounds_exact_powers() {
    assert_eq!(simplified("(2^100)^10"), simplified("2^1000"));

    let limits = Limits {
        max_exact_bits: 64,
        ..Limits::default()
    };
    let large = simplify::simplify(&parsed("2^100"), &limits).expect("simplifies");
    assert!(matches!(large, Expr::Const(Number::Float(_))), "{large}");
    let small = simplify::simplify(&parsed("2^10"), &limits).expect("simplifies");
    assert_eq!(small, int(1024));

    let Err(SolveError::Domain(e)) = solve("(9^4096)^64", "x") else {
        panic!("expected a domain error");
    };
    assert_eq!(e.kind, DomainErrorKind::Overflow);
    assert!(matches!(
        solve("(9^4096)^4096", "x"),
        Err(SolveError::Domain(DomainError {
            kind: DomainErrorKind::Overflow
        }))
    ));
}

#[test]
fn test_simplify_is_idempotent() {
    let limits = Limits::default();
    for input in [
        "(x+2)(x-3) + 4x/2",
        "a*x + b*x + a*x",
        "(x - y)^3",
        "2xy - yx",
        "x/(x+1) + 1/(x+1)",
        "sqrt(x)*sqrt(x)",
    ] {
        let once = simplify::simplify(&parsed(input), &limits).expect("simplifies");
        let twice = simplify::simplify(&once, &limits).expect("simplifies");
        assert_eq!(once, twice, "{input}");
    }
}

#[test]
fn test_simplify_is_deterministic_across_orderings() {
    assert_eq!(simplified("x*y + 2"), simplified("2 + y*x"));
    assert_eq!(simplified("(x+1)(x+2)"), simplified("(2+x)(1+x)"));
}

// ====== SOLVER TESTS ======

#[test]
fn test_solve_linear() {
    assert_eq!(solved("2x + 4 = 10"), SolutionSet::Finite(vec![int(3)]));
    assert_eq!(
        solved("3x = 2"),
        SolutionSet::Finite(vec![Expr::Const(Number::ratio(2, 3))])
    );
}

#[test]
fn test_solve_degenerate() {
    assert_eq!(solved("x - x = 5"), SolutionSet::Empty);
    assert_eq!(solved("x - x = 0"), SolutionSet::AllReals);
    assert_eq!(solved("2(x + 1) = 2x + 2"), SolutionSet::AllReals);
}

#[test]
fn test_solve_scalar() {
    assert_eq!(solved("2 + 2"), SolutionSet::Scalar(int(4)));
    assert_eq!(solved("2 = 3"), SolutionSet::Scalar(int(-1)));
}

#[test]
fn test_solve_quadratic_orders_roots() {
    assert_eq!(
        solved("x^2 - 4 = 0"),
        SolutionSet::Finite(vec![int(2), int(-2)])
    );
    assert_eq!(
        solved("x^2 + 1 = 0"),
        SolutionSet::Finite(vec![
            Expr::Const(Number::imaginary_unit()),
            Expr::Const(-&Number::imaginary_unit()),
        ])
    );
}

#[test]
fn test_solve_repeated_root_reported_once() {
    assert_eq!(solved("x^2 - 2x + 1 = 0"), SolutionSet::Finite(vec![int(1)]));
    assert_eq!(solved("(x - 3)^3 = 0"), SolutionSet::Finite(vec![int(3)]));
}

#[test]
fn test_solve_repeated_irrational_and_complex_roots() {
    assert_eq!(
        solve("(x^2 - 2)^2 = 0", "x").expect("solves"),
        "x = 1.4142135623730951 or x = -1.4142135623730951"
    );
    assert_eq!(solve("(x^2 + 1)^2 = 0", "x").expect("solves"), "x = i or x = -i");
    assert_eq!(
        solved("x^2 (x - 1)^3 (x + 1)^2 = 0"),
        SolutionSet::Finite(vec![int(1), int(0), int(-1)])
    );

    let SolutionSet::Finite(roots) = solved("(x^3 - 2)^2 = 0") else {
        panic!("expected roots");
    };
    assert_eq!(roots.len(), 3);
    let real = roots[0].as_number().expect("numeric root");
    assert!(real.is_real());
    assert!((real.re_f64() - 2f64.cbrt()).abs() < 1e-9);
}

#[test]
fn test_solve_float_double_root() {
    let SolutionSet::Finite(roots) = solved("x^2 - 0.2x + 0.01 = 0") else {
        panic!("expected roots");
    };
    assert_eq!(roots.len(), 1);
    let root = roots[0].as_number().expect("numeric root");
    assert!((root.re_f64() - 0.1).abs() < 1e-12);

    // distinct float roots stay distinct
    let SolutionSet::Finite(roots) = solved("x^2 - 0.3x + 0.02 = 0") else {
        panic!("expected roots");
    };
    assert_eq!(roots.len(), 2);
}

#[test]
fn test_solve_expands_powers_of_sums() {
    assert_eq!(solved("(x + 1)^20 = 0"), SolutionSet::Finite(vec![int(-1)]));
    assert_eq!(
        solved("(x - 2)^17 (x + 3) = 0"),
        SolutionSet::Finite(vec![int(2), int(-3)])
    );
    assert_eq!(solved("(x + 1)^20 - (x + 1)^20 = 0"), SolutionSet::AllReals);

    let err = solve_set("(x + 1)^65 = 0", "x", &Limits::default()).expect_err("too large");
    assert!(err.to_string().contains("exceeds the limit of 64"), "{err}");
}

#[test]
fn test_solve_rational_roots_past_divisor_bound() {
    let limits = Limits {
        max_divisor_search: 10,
        ..Limits::default()
    };
    // 6! has divisors beyond the trial division bound
    let equation = "(x+1)(x+2)(x+3)(x+4)(x+5)(x+6) = 0";
    assert_eq!(
        solve_set(equation, "x", &limits).expect("solves"),
        SolutionSet::Finite((1..=6).map(|k| int(-k)).collect())
    );

    let err = solve_set("(x - 1000003)(x - 1000033)(x^3 + 2) = 0", "x", &Limits::default())
        .expect_err("roots out of reach");
    assert_eq!(
        err.to_string(),
        "Could not solve equation: rational root search bound reached for a degree 5 polynomial"
    );
}

#[test]
fn test_solve_rational_roots_of_higher_degree() {
    assert_eq!(
        solved("x^3 - 6x^2 + 11x - 6 = 0"),
        SolutionSet::Finite(vec![int(3), int(2), int(1)])
    );
    assert_eq!(
        solved("x^4 - 5x^2 + 4 = 0"),
        SolutionSet::Finite(vec![int(2), int(1), int(-1), int(-2)])
    );
    assert_eq!(solved("x^3 = 0"), SolutionSet::Finite(vec![int(0)]));
}

#[test]
fn test_solve_cubic_numerically() {
    let SolutionSet::Finite(roots) = solved("x^3 - 2 = 0") else {
        panic!("expected roots");
    };
    assert_eq!(roots.len(), 3);
    let real = roots[0].as_number().expect("numeric root");
    assert!(real.is_real());
    assert!((real.re_f64() - 2f64.cbrt()).abs() < 1e-9);
    assert!(roots[1..]
        .iter()
        .all(|r| r.as_number().is_some_and(|n| !n.is_real())));
}

#[test]
fn test_solve_clears_denominators() {
    assert_eq!(
        solved("1/x = 2"),
        SolutionSet::Finite(vec![Expr::Const(Number::ratio(1, 2))])
    );
    assert_eq!(solved("1/x = 0"), SolutionSet::Empty);
    // x = 1 would divide by zero
    assert_eq!(
        solved("(x^2 - 1)/(x - 1) = 0"),
        SolutionSet::Finite(vec![int(-1)])
    );
}

#[test]
fn test_solve_imaginary_coefficient() {
    assert_eq!(
        solved("2Ix = 2"),
        SolutionSet::Finite(vec![Expr::Const(-&Number::imaginary_unit())])
    );
}

#[test]
fn test_solve_symbolic_linear() {
    let SolutionSet::Finite(roots) = solved("a*x + b = 0") else {
        panic!("expected a root");
    };
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0].to_string(), "-b/a");
}

#[test]
fn test_solve_unsolved_shapes() {
    let limits = Limits::default();
    for input in ["sin(x) = 0", "x^5 + x + 1 = 0", "x^2 = a", "2^x = 8"] {
        let err = solve_set(input, "x", &limits).expect_err(input);
        assert!(matches!(err, SolveError::Unsolved(Unsolved { .. })), "{input}");
        assert_eq!(err.class(), ErrorClass::CouldNotSolve);
    }
}

#[test]
fn test_solve_respects_degree_limit() {
    let limits = Limits {
        max_degree: 2,
        ..Limits::default()
    };
    assert!(matches!(
        solve_set("x^3 = 1", "x", &limits),
        Err(SolveError::Unsolved(_))
    ));
}

#[test]
fn test_solve_other_variable() {
    assert_eq!(
        solve_set("3y - 9 = 0", "y", &Limits::default()).expect("solves"),
        SolutionSet::Finite(vec![int(3)])
    );
}

// ====== FORMATTER TESTS ======

#[test]
fn test_format_solution_sets() {
    assert_eq!(format_solution(&SolutionSet::Empty, "x"), "No solution exists");
    assert_eq!(
        format_solution(&SolutionSet::Finite(vec![]), "x"),
        "No solution exists"
    );
    assert_eq!(
        format_solution(&SolutionSet::AllReals, "y"),
        "y can be any real number"
    );
    assert_eq!(
        format_solution(
            &SolutionSet::Finite(vec![int(3), Expr::Const(Number::ratio(-1, 2))]),
            "x"
        ),
        "x = 3 or x = -1/2"
    );
    assert_eq!(
        format_solution(&SolutionSet::Scalar(Expr::Const(Number::float(2.5))), "x"),
        "2.5"
    );
}

#[test]
fn test_format_numbers() {
    assert_eq!(Number::float(3.0).to_string(), "3");
    assert_eq!(Number::float(-0.0).to_string(), "0");
    assert_eq!(
        Number::Float(num_complex::Complex64::new(1.5, -2.0)).to_string(),
        "1.5-2i"
    );
    assert_eq!(
        (&Number::ratio(3, 2) * &Number::imaginary_unit()).to_string(),
        "(3/2)i"
    );
    assert_eq!(
        (&Number::integer(-1) + &(&Number::integer(2) * &Number::imaginary_unit())).to_string(),
        "-1+2i"
    );
}

// ====== ENTRY POINT TESTS ======

#[test]
fn test_input_validation() {
    assert!(matches!(solve("", "x"), Err(SolveError::EmptyInput)));
    assert!(matches!(solve("   ", "x"), Err(SolveError::EmptyInput)));

    let long = "x".repeat(MAX_INPUT_LEN + 1);
    assert!(matches!(
        solve(&long, "x"),
        Err(SolveError::InputTooLong { len: 501, max: 500 })
    ));

    assert!(matches!(solve("x = 1", "2x"), Err(SolveError::InvalidVariable(_))));
    assert!(matches!(solve("x = 1", "sin"), Err(SolveError::InvalidVariable(_))));
}

#[test]
fn test_error_classes() {
    let class = |input: &str| solve(input, "x").expect_err(input).class();
    assert_eq!(class("x + $"), ErrorClass::InvalidInput);
    assert_eq!(class("(x"), ErrorClass::InvalidInput);
    assert_eq!(class("1/0"), ErrorClass::InvalidInput);
    assert_eq!(class(""), ErrorClass::InvalidInput);
    assert_eq!(class("cos(x) = x"), ErrorClass::CouldNotSolve);
}
