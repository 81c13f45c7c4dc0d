//! 実際のマシンに対する式評価のテスト

use sdb_core::{Debugger, EvalError, Machine, ParseError};
use sdb_target::{Memory, MEMORY_BASE};

fn debugger() -> Debugger {
    let mut machine = Machine::new(Memory::new(MEMORY_BASE, 0x100));
    machine.memory_mut().write(MEMORY_BASE + 0x40, 8, 0x1234).unwrap();
    machine.registers_mut().set_gpr(2, MEMORY_BASE + 0x40);
    Debugger::new(machine).unwrap()
}

#[test]
fn test_arithmetic() {
    let dbg = debugger();
    assert_eq!(dbg.evaluate_expression("2+3*4"), Ok(14));
    assert_eq!(dbg.evaluate_expression("(2+3)*4"), Ok(20));
    assert_eq!(dbg.evaluate_expression("4*2"), Ok(8));
    assert_eq!(dbg.evaluate_expression("1==1"), Ok(1));
    assert_eq!(dbg.evaluate_expression("1!=1"), Ok(0));
}

#[test]
fn test_registers_and_memory() {
    let dbg = debugger();
    assert_eq!(dbg.evaluate_expression("$pc"), Ok(MEMORY_BASE));
    assert_eq!(dbg.evaluate_expression("$sp - $pc"), Ok(0x40));
    assert_eq!(dbg.evaluate_expression("*$sp"), Ok(0x1234));
    assert_eq!(dbg.evaluate_expression("*$sp / 2 == 0x91a"), Ok(1));
    assert_eq!(dbg.evaluate_expression("$0 + $x2 == $sp"), Ok(1));
}

#[test]
fn test_user_errors_are_recoverable() {
    let dbg = debugger();
    assert_eq!(dbg.evaluate_expression("1/0"), Err(EvalError::DivideByZero));
    assert_eq!(
        dbg.evaluate_expression("(1+2"),
        Err(EvalError::UnbalancedParens { position: 0 })
    );
    assert_eq!(
        dbg.evaluate_expression("@"),
        Err(EvalError::Parse(ParseError::UnexpectedCharacter { position: 0 }))
    );
    assert!(matches!(
        dbg.evaluate_expression("*0"),
        Err(EvalError::BadAddress { address: 0, .. })
    ));
    assert_eq!(
        dbg.evaluate_expression("$rax"),
        Err(EvalError::UnknownRegister {
            name: "rax".to_string()
        })
    );
}
