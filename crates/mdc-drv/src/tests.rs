//! Driver unit tests: gating, options, exit codes.

use crate::{check, compile, exit_code, run_source, CompileOptions, DriverError};
use mdc_mir::OptLevel;
use mdc_vm::VmOptions;

#[test]
fn strict_compile_fails_on_syntax_error() {
    let result = compile("Set `x` to .", &CompileOptions::default());
    let diagnostics = result.unwrap_err();
    assert!(!diagnostics.is_empty());
}

#[test]
fn lenient_compile_builds_through_recovered_errors() {
    let options = CompileOptions::default().lenient();
    let module = compile("Set `x` to . Set `y` to _10_. Give back `y`.", &options);
    assert!(module.is_ok());
}

#[test]
fn clean_program_compiles_strictly() {
    let module = compile("Give back _1_.", &CompileOptions::default());
    assert!(module.is_ok());
}

#[test]
fn check_reports_without_building() {
    let diagnostics = check("Set `x` to .");
    assert_eq!(diagnostics.len(), 1);
    assert!(check("Give back _1_.").is_empty());
}

#[test]
fn tokens_helper_lexes() {
    let (tokens, diagnostics) = crate::tokens("Set `x` to _1_.");
    assert!(diagnostics.is_empty());
    assert!(tokens.len() > 4);
    assert!(tokens.last().unwrap().is_eof());
}

#[test]
fn exit_codes_match_policy() {
    let ok = run_source(
        "Give back _1_.",
        &CompileOptions::default(),
        VmOptions::default(),
    );
    assert_eq!(exit_code(&ok), 0);

    let compile_err = run_source(
        "Set `x` to .",
        &CompileOptions::default(),
        VmOptions::default(),
    );
    assert!(matches!(compile_err, Err(DriverError::Compile(_))));
    assert_eq!(exit_code(&compile_err), 1);

    let runtime_err = run_source(
        "Give back _1_ / _0_.",
        &CompileOptions::default(),
        VmOptions::default(),
    );
    assert!(matches!(runtime_err, Err(DriverError::Runtime(_))));
    assert_eq!(exit_code(&runtime_err), 2);
}

#[test]
fn opt_level_mapping() {
    assert_eq!(OptLevel::from_cli(0), OptLevel::None);
    assert_eq!(OptLevel::from_cli(1), OptLevel::Basic);
    assert_eq!(OptLevel::from_cli(2), OptLevel::Aggressive);
    assert_eq!(OptLevel::from_cli(3), OptLevel::Aggressive);
}

#[test]
fn module_name_is_recorded() {
    let options = CompileOptions::default().with_module_name("demo");
    let module = compile("Give back _1_.", &options).unwrap();
    assert_eq!(module.name, "demo");
}
