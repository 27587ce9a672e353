//! End-to-end scenarios: AST → bytecode → VM.

use pretty_assertions::assert_eq;
use vesper::ast::{BinaryOp, Expr, FunctionDecl, Program, Stmt};
use vesper::bytecode::{decode_module, disassemble, Instruction, MAGIC};
use vesper::config::VmConfig;
use vesper::error::{CompileError, VesperError};
use vesper::object::Value;
use vesper::{compile, compile_and_run, compile_and_run_with_config};

fn program(statements: Vec<Stmt>) -> Program {
    Program::new("scripts/main.vsp", "main", statements)
}

#[test]
fn test_constant_arithmetic_compiles_to_loads() {
    let bytes = compile(program(vec![
        Stmt::expr(Expr::binary(Expr::int(2), BinaryOp::Add, Expr::int(2))),
        Stmt::expr(Expr::binary(Expr::int(2), BinaryOp::Add, Expr::double(3.14))),
    ]))
    .unwrap();

    assert_eq!(u32::from_le_bytes(bytes[0..4].try_into().unwrap()), MAGIC);
    assert_eq!(
        u64::from_le_bytes(bytes[8..16].try_into().unwrap()),
        bytes.len() as u64
    );
    assert_eq!(
        decode_module(&bytes).unwrap(),
        vec![
            Instruction::LoadInt(4),
            Instruction::Pop,
            Instruction::LoadDouble(2.0 + 3.14),
            Instruction::Pop,
            Instruction::LoadNull,
            Instruction::Return,
        ]
    );
}

#[test]
fn test_globals_after_run() {
    let (vm, result) = compile_and_run(program(vec![
        Stmt::var("pi", Expr::double(3.14)),
        Stmt::var("big", Expr::binary(Expr::int(2147483647), BinaryOp::Add, Expr::int(1))),
        Stmt::var(
            "greeting",
            Expr::binary(Expr::string("Hello, "), BinaryOp::Add, Expr::string("World")),
        ),
    ]))
    .unwrap();

    assert_eq!(result, Value::Null);
    assert_eq!(vm.global("pi"), Some(Value::Double(3.14)));
    assert_eq!(vm.global("big"), Some(Value::Int64(2147483648)));
    let greeting = vm.global("greeting").unwrap();
    assert_eq!(vm.heap().describe(greeting), "Hello, World");
}

#[test]
fn test_error_values_flow_through_the_program() {
    // var zero = 0; var e = 10 / zero; var still = e + 1; var msg = "n: " + 1;
    let (vm, _) = compile_and_run(program(vec![
        Stmt::var("zero", Expr::int(0)),
        Stmt::var("e", Expr::binary(Expr::int(10), BinaryOp::Divide, Expr::name("zero"))),
        Stmt::var("still", Expr::binary(Expr::name("e"), BinaryOp::Add, Expr::int(1))),
        Stmt::var("msg", Expr::binary(Expr::string("n: "), BinaryOp::Add, Expr::int(1))),
    ]))
    .unwrap();

    let still = vm.global("still").unwrap();
    assert!(still.is_error());
    assert_eq!(vm.heap().describe(still), "Error: division by zero");
    let msg = vm.global("msg").unwrap();
    assert_eq!(vm.heap().describe(msg), "Error: cannot add String and Int");
}

#[test]
fn test_closures_counting_with_for_in() {
    // function make_adder(n) { function add(x) { return x + n; } return add; }
    // var add3 = make_adder(3); var out = [];  (collected via str)
    let add = FunctionDecl::new(
        Some("add"),
        &["x"],
        vec![Stmt::ret(Some(Expr::binary(
            Expr::name("x"),
            BinaryOp::Add,
            Expr::name("n"),
        )))],
    );
    let make_adder = FunctionDecl::new(
        Some("make_adder"),
        &["n"],
        vec![Stmt::function(add), Stmt::ret(Some(Expr::name("add")))],
    );
    let (vm, _) = compile_and_run(program(vec![
        Stmt::function(make_adder),
        Stmt::var("add3", Expr::call(Expr::name("make_adder"), vec![Expr::int(3)])),
        Stmt::var("total", Expr::int(0)),
        Stmt::for_in(
            None,
            "i",
            Expr::call(Expr::name("range"), vec![Expr::int(4)]),
            Stmt::expr(Expr::assign(
                Expr::name("total"),
                Expr::binary(
                    Expr::name("total"),
                    BinaryOp::Add,
                    Expr::call(Expr::name("add3"), vec![Expr::name("i")]),
                ),
            )),
        ),
    ]))
    .unwrap();

    // (0+3) + (1+3) + (2+3) + (3+3)
    assert_eq!(vm.global("total"), Some(Value::Int(18)));
}

#[test]
fn test_garbage_collection_under_pressure() {
    // Every iteration builds a throwaway array; only `keep` must survive.
    let config = VmConfig {
        gc_threshold: 16,
        ..VmConfig::default()
    };
    let (mut vm, _) = compile_and_run_with_config(
        program(vec![
            Stmt::var(
                "keep",
                Expr::map(vec![(
                    Expr::string("nested"),
                    Expr::array(vec![Expr::int(1), Expr::int(2)]),
                )]),
            ),
            Stmt::for_in(
                None,
                "i",
                Expr::range(Expr::int(0), Expr::int(500), None),
                Stmt::expr(Expr::array(vec![Expr::name("i"), Expr::string("junk")])),
            ),
        ]),
        config,
    )
    .unwrap();

    assert!(vm.heap().last_stats().collections >= 10);
    let stats = vm.collect_garbage();
    // Natives, the global environment and the data behind `keep` stay bounded.
    assert!(stats.live < 40, "{:?}", stats);
    let keep = vm.global("keep").unwrap();
    assert_eq!(vm.heap().describe(keep), "{\"nested\": [1, 2]}");
}

#[test]
fn test_compile_errors_carry_file_and_span() {
    let err = compile(program(vec![
        Stmt::constant("limit", Expr::int(1)),
        Stmt::expr(Expr::assign(Expr::name("limit"), Expr::int(2))),
    ]))
    .unwrap_err();

    match err {
        VesperError::Compile(CompileError::ConstAssignment { name, file, .. }) => {
            assert_eq!(name, "limit");
            assert_eq!(file, "scripts/main.vsp");
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_disassembly_lists_every_instruction() {
    let bytes = compile(program(vec![
        Stmt::var("n", Expr::int(3)),
        Stmt::while_loop(
            Expr::binary(Expr::name("n"), BinaryOp::Greater, Expr::int(0)),
            Stmt::expr(Expr::assign(
                Expr::name("n"),
                Expr::binary(Expr::name("n"), BinaryOp::Subtract, Expr::int(1)),
            )),
        ),
    ]))
    .unwrap();

    let listing = disassemble(&bytes).unwrap();
    let body_lines = listing.lines().skip(1).count();
    assert_eq!(body_lines, decode_module(&bytes).unwrap().len());
    assert!(listing.contains("Greater"));
}
