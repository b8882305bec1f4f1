//! Parser test suite.

use crate::ast::*;
use crate::parse;
use mdc_util::diagnostic::codes;
use mdc_util::Handler;

fn parse_ok(source: &str) -> Program {
    let handler = Handler::new();
    let program = parse(source, &handler);
    assert!(
        !handler.has_errors(),
        "unexpected diagnostics: {:?}",
        handler.diagnostics()
    );
    program
}

#[test]
fn set_statement() {
    let program = parse_ok("Set `x` to _42_.");
    assert_eq!(program.statements.len(), 1);
    let Stmt::Set(set) = &program.statements[0] else {
        panic!("expected Set, got {:?}", program.statements[0]);
    };
    assert_eq!(set.name.name.as_str(), "x");
    assert!(matches!(set.value, Expr::Int(IntLit { value: 42, .. })));
}

#[test]
fn multiplication_binds_tighter_than_addition() {
    let program = parse_ok("Set `x` to _2_ + _3_ * _4_.");
    let Stmt::Set(set) = &program.statements[0] else {
        panic!()
    };
    let Expr::Infix(add) = &set.value else {
        panic!("expected infix, got {:?}", set.value)
    };
    assert_eq!(add.op, BinOp::Add);
    let Expr::Infix(mul) = add.right.as_ref() else {
        panic!("expected right operand to be the product")
    };
    assert_eq!(mul.op, BinOp::Mul);
}

#[test]
fn addition_is_left_associative() {
    let program = parse_ok("Set `x` to _1_ - _2_ - _3_.");
    let Stmt::Set(set) = &program.statements[0] else {
        panic!()
    };
    let Expr::Infix(outer) = &set.value else { panic!() };
    assert_eq!(outer.op, BinOp::Sub);
    assert!(matches!(outer.left.as_ref(), Expr::Infix(_)));
    assert!(matches!(outer.right.as_ref(), Expr::Int(_)));
}

#[test]
fn power_is_right_associative() {
    let program = parse_ok("Set `x` to _2_ ^ _3_ ^ _2_.");
    let Stmt::Set(set) = &program.statements[0] else {
        panic!()
    };
    let Expr::Infix(outer) = &set.value else { panic!() };
    assert_eq!(outer.op, BinOp::Pow);
    assert!(matches!(outer.left.as_ref(), Expr::Int(_)));
    assert!(matches!(outer.right.as_ref(), Expr::Infix(_)));
}

#[test]
fn comparison_and_logic_precedence() {
    // `a is less than b and c equals d` groups each comparison first.
    let program = parse_ok("give back `a` is less than `b` and `c` equals `d`.");
    let Stmt::Return(ret) = &program.statements[0] else {
        panic!()
    };
    let Expr::Infix(and) = ret.value.as_ref().unwrap() else {
        panic!()
    };
    assert_eq!(and.op, BinOp::And);
    let Expr::Infix(lt) = and.left.as_ref() else { panic!() };
    assert_eq!(lt.op, BinOp::Lt);
    let Expr::Infix(eq) = and.right.as_ref() else { panic!() };
    assert_eq!(eq.op, BinOp::Eq);
}

#[test]
fn grouping() {
    let program = parse_ok("Set `x` to (_2_ + _3_) * _4_.");
    let Stmt::Set(set) = &program.statements[0] else {
        panic!()
    };
    let Expr::Infix(mul) = &set.value else { panic!() };
    assert_eq!(mul.op, BinOp::Mul);
    assert!(matches!(mul.left.as_ref(), Expr::Group(_)));
}

#[test]
fn prefix_operators() {
    let program = parse_ok("give back not `ready`.");
    let Stmt::Return(ret) = &program.statements[0] else {
        panic!()
    };
    let Expr::Prefix(prefix) = ret.value.as_ref().unwrap() else {
        panic!()
    };
    assert_eq!(prefix.op, PrefixOp::Not);

    let program = parse_ok("give back -`x`.");
    let Stmt::Return(ret) = &program.statements[0] else {
        panic!()
    };
    assert!(matches!(
        ret.value.as_ref().unwrap(),
        Expr::Prefix(PrefixExpr {
            op: PrefixOp::Neg,
            ..
        })
    ));
}

#[test]
fn conditional_expression_condition_in_middle() {
    let program = parse_ok("Set `x` to _\"big\"_ if `n` is greater than _10_ else _\"small\"_.");
    let Stmt::Set(set) = &program.statements[0] else {
        panic!()
    };
    let Expr::Conditional(cond) = &set.value else {
        panic!("expected conditional, got {:?}", set.value)
    };
    assert!(matches!(cond.then_value, Expr::Str(_)));
    assert!(matches!(cond.condition, Expr::Infix(_)));
    assert!(matches!(cond.else_value, Expr::Str(_)));
}

#[test]
fn conditional_with_when_otherwise() {
    let program = parse_ok("Set `x` to _1_ when `ok` otherwise _2_.");
    let Stmt::Set(set) = &program.statements[0] else {
        panic!()
    };
    assert!(matches!(set.value, Expr::Conditional(_)));
}

#[test]
fn if_statement_with_block() {
    let program = parse_ok("If `x` is greater than _10_ then:\n> Set `y` to _1_.\n");
    let Stmt::If(ifs) = &program.statements[0] else {
        panic!()
    };
    assert_eq!(ifs.consequence.depth, 1);
    assert_eq!(ifs.consequence.statements.len(), 1);
    assert!(ifs.alternative.is_none());
}

#[test]
fn if_else_statement() {
    let source = "Set `x` to _15_.\n\
                  If `x` is greater than _10_ then:\n\
                  > Set `y` to _\"big\"_.\n\
                  else:\n\
                  > Set `y` to _\"small\"_.\n\
                  Give back `y`.\n";
    let program = parse_ok(source);
    assert_eq!(program.statements.len(), 3);
    let Stmt::If(ifs) = &program.statements[1] else {
        panic!()
    };
    assert_eq!(ifs.consequence.statements.len(), 1);
    assert_eq!(ifs.alternative.as_ref().unwrap().statements.len(), 1);
}

#[test]
fn nested_if_blocks() {
    let source = "If `a` then:\n\
                  > Set `x` to _1_.\n\
                  > If `b` then:\n\
                  >> Set `x` to _2_.\n\
                  > Set `y` to _3_.\n";
    let program = parse_ok(source);
    let Stmt::If(outer) = &program.statements[0] else {
        panic!()
    };
    assert_eq!(outer.consequence.statements.len(), 3);
    let Stmt::If(inner) = &outer.consequence.statements[1] else {
        panic!("expected nested if")
    };
    assert_eq!(inner.consequence.depth, 2);
}

#[test]
fn nested_if_with_else() {
    let source = "If `a` then:\n\
                  > If `b` then:\n\
                  >> Say _1_.\n\
                  > else:\n\
                  >> Say _2_.\n";
    let program = parse_ok(source);
    let Stmt::If(outer) = &program.statements[0] else {
        panic!()
    };
    let Stmt::If(inner) = &outer.consequence.statements[0] else {
        panic!()
    };
    assert!(inner.alternative.is_some());
}

#[test]
fn when_and_whenever_are_if() {
    for kw in ["When", "Whenever"] {
        let program = parse_ok(&format!("{kw} `x` then:\n> Say _1_.\n"));
        assert!(matches!(program.statements[0], Stmt::If(_)));
    }
}

#[test]
fn call_statement_with_args() {
    let program = parse_ok("Call `greet` with _\"hi\"_, `name`.");
    let Stmt::Call(call) = &program.statements[0] else {
        panic!()
    };
    assert_eq!(call.callee.name.as_str(), "greet");
    assert_eq!(call.args.positional.len(), 2);
    assert!(call.args.named.is_empty());
}

#[test]
fn call_with_named_args() {
    let program = parse_ok("Call `resize` with _10_, width: _20_, height: _30_.");
    let Stmt::Call(call) = &program.statements[0] else {
        panic!()
    };
    assert_eq!(call.args.positional.len(), 1);
    assert_eq!(call.args.named.len(), 2);
    assert_eq!(call.args.named[0].0.name.as_str(), "width");
}

#[test]
fn use_and_apply_are_call() {
    for kw in ["Use", "Apply"] {
        let program = parse_ok(&format!("{kw} `f`."));
        assert!(matches!(program.statements[0], Stmt::Call(_)));
    }
}

#[test]
fn duplicate_named_argument_is_reported() {
    let handler = Handler::new();
    parse("Call `f` with width: _1_, width: _2_.", &handler);
    let diags = handler.diagnostics();
    assert!(diags.iter().any(|d| d.code == codes::E_DUPLICATE_NAMED_ARG));
}

#[test]
fn positional_after_named_is_reported() {
    let handler = Handler::new();
    parse("Call `f` with width: _1_, _2_.", &handler);
    let diags = handler.diagnostics();
    assert!(diags
        .iter()
        .any(|d| d.code == codes::E_POSITIONAL_AFTER_NAMED));
}

#[test]
fn call_expression_in_set() {
    let program = parse_ok("Set `x` to call `fib` with _10_.");
    let Stmt::Set(set) = &program.statements[0] else {
        panic!()
    };
    let Expr::Call(call) = &set.value else { panic!() };
    assert_eq!(call.callee.name.as_str(), "fib");
    assert_eq!(call.args.positional.len(), 1);
}

#[test]
fn say_statement() {
    let program = parse_ok("Say `x` + _1_.");
    assert!(matches!(program.statements[0], Stmt::Say(_)));
}

#[test]
fn give_back_without_value() {
    let program = parse_ok("give back.");
    let Stmt::Return(ret) = &program.statements[0] else {
        panic!()
    };
    assert!(ret.value.is_none());
}

#[test]
fn stopwords_are_skipped() {
    let with = parse_ok("Set the `x` to a _1_.");
    let without = parse_ok("Set `x` to _1_.");
    // Same shape either way.
    assert_eq!(with.statements.len(), without.statements.len());
    assert!(matches!(with.statements[0], Stmt::Set(_)));
}

#[test]
fn action_definition() {
    let source = "### **Action**: `double`\n\
                  <details>\n\
                  <summary>Doubles a number.</summary>\n\
                  #### Inputs\n\
                  - `n` as Whole Number\n\
                  #### Outputs\n\
                  - Whole Number\n\
                  give back `n` * _2_.\n\
                  </details>\n";
    let program = parse_ok(source);
    let Stmt::Action(def) = &program.statements[0] else {
        panic!("expected Action, got {:?}", program.statements[0])
    };
    assert_eq!(def.name.name.as_str(), "double");
    assert_eq!(def.visibility, Visibility::Private);
    assert_eq!(def.doc.unwrap().as_str(), "Doubles a number.");
    assert_eq!(def.params.len(), 1);
    assert_eq!(def.params[0].name.name.as_str(), "n");
    assert_eq!(def.params[0].ty, Some(TypeName::WholeNumber));
    assert_eq!(def.output, Some(TypeName::WholeNumber));
    assert_eq!(def.body.statements.len(), 1);
}

#[test]
fn interaction_is_public() {
    let source = "### **Interaction**: `greet`\n<details>\nSay _\"hi\"_.\n</details>\n";
    let program = parse_ok(source);
    let Stmt::Interaction(def) = &program.statements[0] else {
        panic!()
    };
    assert_eq!(def.visibility, Visibility::Public);
}

#[test]
fn method_body_with_block() {
    let source = "### **Action**: `fib`\n\
                  <details>\n\
                  #### Inputs\n\
                  - `n` as Whole Number\n\
                  If `n` is less than _2_ then:\n\
                  > give back `n`.\n\
                  give back (call `fib` with `n` - _1_) + (call `fib` with `n` - _2_).\n\
                  </details>\n";
    let program = parse_ok(source);
    let Stmt::Action(def) = &program.statements[0] else {
        panic!()
    };
    assert_eq!(def.body.statements.len(), 2);
    assert!(matches!(def.body.statements[0], Stmt::If(_)));
}

#[test]
fn recovery_at_malformed_set() {
    let handler = Handler::new();
    let program = parse("Set `x` to . Set `y` to _10_. Give back `y`.", &handler);
    assert_eq!(handler.error_count(), 1, "{:?}", handler.diagnostics());
    assert_eq!(program.statements.len(), 3);
    // The malformed statement holds an error expression; the rest parse fine.
    let Stmt::Set(bad) = &program.statements[0] else {
        panic!()
    };
    assert!(matches!(bad.value, Expr::Error(_)));
    assert!(matches!(program.statements[1], Stmt::Set(_)));
    assert!(matches!(program.statements[2], Stmt::Return(_)));
}

#[test]
fn recovery_collects_skipped_tokens() {
    let handler = Handler::new();
    let program = parse("to to to . Say _1_.", &handler);
    assert!(handler.has_errors());
    let Stmt::Error(err) = &program.statements[0] else {
        panic!("expected error statement, got {:?}", program.statements[0])
    };
    assert!(!err.skipped.is_empty());
    assert!(matches!(program.statements[1], Stmt::Say(_)));
}

#[test]
fn recovery_is_bounded() {
    let source = "to to .\n".repeat(30);
    let handler = Handler::new();
    let _ = parse(&source, &handler);
    assert!(handler
        .diagnostics()
        .iter()
        .any(|d| d.code == codes::E_RECOVERY_LIMIT));
}

#[test]
fn bare_identifier_in_set_is_reported() {
    let handler = Handler::new();
    let program = parse("Set x to _1_.", &handler);
    assert_eq!(handler.error_count(), 1);
    // Still parses as a Set statement.
    assert!(matches!(program.statements[0], Stmt::Set(_)));
}

#[test]
fn backtick_identifier_round_trips_through_print() {
    let program = parse_ok("Set `total price` to _3_.");
    let printed = program.to_string();
    assert!(printed.contains("`total price`"), "printed: {printed}");

    // Printing is a fixpoint: reparsing the printed form prints the same.
    let reparsed = parse_ok(&printed);
    assert_eq!(printed, reparsed.to_string());
}

#[test]
fn print_round_trip_for_if() {
    let source = "If `x` is greater than _10_ then:\n> Set `y` to _1_.\nelse:\n> Set `y` to _2_.\n";
    let program = parse_ok(source);
    let printed = program.to_string();
    let reparsed = parse_ok(&printed);
    assert_eq!(printed, reparsed.to_string());
}

#[test]
fn missing_terminator_reported() {
    let handler = Handler::new();
    parse("Set `x` to _1_ Set `y` to _2_.", &handler);
    assert!(handler
        .diagnostics()
        .iter()
        .any(|d| d.code == codes::E_MISSING_TERMINATOR));
}

#[test]
fn statement_spans_point_at_source() {
    let program = parse_ok("Set `x` to _1_.\nSay `x`.");
    assert_eq!(program.statements[0].span().line, 1);
    assert_eq!(program.statements[1].span().line, 2);
}
