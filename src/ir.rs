//! The pseudo-instruction IR and the AST→IR lowering.
//!
//! ASDL:
//!   ir_program = IrProgram(global_table strings, ir_function main, ir_function* definitions)
//!   ir_function = IrFunction(identifier name, symbol_table, instruction* code)
//!   instruction = Set(name dst, int) | SetLabel(name dst, label)
//!               | Move(name dst, name src)
//!               | Add | Sub | Mult | Div | Mod (name dst, name src1, name src2)
//!               | Nop | Label(label) | Jump(label)
//!               | BranchCompare(compare, name src1, name src2, label, label)
//!               | BranchZero(zero_compare, name src, label, label)
//!               | Enter | Leave
//!               | Arg(int index, name src) | Call(label) | ReturnValue(name dst)
//!               | Return(name src)
//!               | GetInt(name dst) | PutInt(name src) | PutString(name src)
//!               | Comment(string)
//!   compare = LessThan | Equal | LessOrEqual
//!   zero_compare = LessThanZero | EqualZero | LessOrEqualZero | GreaterThanZero
//!
//! Operands are names drawn from a function's symbol table; all values are
//! one machine word, with strings represented by the address of their label.
//!
//! Expressions lower in one of two modes: *value mode* places the result in
//! a destination name, *condition mode* transfers control to one of two
//! labels. Boolean-shaped expressions (comparisons, `and`, `or`, `not`,
//! boolean literals, variable lookups) have their own condition lowering;
//! everything else materialises a value and branches on "greater than zero".

use crate::ast::{
    BinaryOperator, Block, Expression, ExpressionKind, Name, Program, Statement,
};
use crate::semantics::{Analysis, SymbolTable, Type};
use crate::value::Value;
use std::collections::HashMap;

pub type Label = String;

#[derive(Debug, PartialEq, Clone)]
pub enum Instruction {
    Set { dst: Name, value: i64 },
    SetLabel { dst: Name, label: Label },
    Move { dst: Name, src: Name },
    Add { dst: Name, src1: Name, src2: Name },
    Sub { dst: Name, src1: Name, src2: Name },
    Mult { dst: Name, src1: Name, src2: Name },
    Div { dst: Name, src1: Name, src2: Name },
    Mod { dst: Name, src1: Name, src2: Name },
    Nop,
    Label(Label),
    Jump(Label),
    BranchCompare {
        condition: Compare,
        src1: Name,
        src2: Name,
        if_true: Label,
        if_false: Label,
    },
    BranchZero {
        condition: ZeroCompare,
        src: Name,
        if_true: Label,
        if_false: Label,
    },
    Enter,
    Leave,
    Arg { index: usize, src: Name },
    Call(Label),
    ReturnValue { dst: Name },
    Return { src: Name },
    GetInt { dst: Name },
    PutInt { src: Name },
    PutString { src: Name },
    Comment(String),
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Compare {
    LessThan,
    Equal,
    LessOrEqual,
}

impl Compare {
    /// The MIPS branch mnemonic suffix.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Compare::LessThan => "lt",
            Compare::Equal => "eq",
            Compare::LessOrEqual => "le",
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ZeroCompare {
    LessThanZero,
    EqualZero,
    LessOrEqualZero,
    GreaterThanZero,
}

impl ZeroCompare {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            ZeroCompare::LessThanZero => "ltz",
            ZeroCompare::EqualZero => "eqz",
            ZeroCompare::LessOrEqualZero => "lez",
            ZeroCompare::GreaterThanZero => "gtz",
        }
    }
}

/// The whole-program side of lowering: the interned string pool (kept in
/// insertion order so emission is deterministic) and the fresh-label
/// counter shared by every function.
#[derive(Debug, Default)]
pub struct GlobalTable {
    strings: Vec<(Label, String)>,
    interned: HashMap<String, Label>,
    next_label: usize,
}

impl GlobalTable {
    pub fn fresh_label(&mut self) -> Label {
        let label = format!("L_{}", self.next_label);
        self.next_label += 1;
        label
    }

    /// Returns the label of a string constant, creating one on first use.
    pub fn intern(&mut self, text: &str) -> Label {
        if let Some(label) = self.interned.get(text) {
            return label.clone();
        }
        let label = format!("S_{}", self.next_label);
        self.next_label += 1;
        self.strings.push((label.clone(), text.to_string()));
        self.interned.insert(text.to_string(), label.clone());
        label
    }

    pub fn strings(&self) -> &[(Label, String)] {
        &self.strings
    }
}

#[derive(Debug)]
pub struct IrProgram {
    pub globals: GlobalTable,
    pub main: IrFunction,
    pub definitions: Vec<IrFunction>,
}

#[derive(Debug)]
pub struct IrFunction {
    pub name: Name,
    pub symbols: SymbolTable,
    pub code: Vec<Instruction>,
}

struct StandardStrings {
    eoln: Label,
    truth: Label,
    falsity: Label,
    none: Label,
}

/// Lowers a checked program. Definitions shadowed by a later definition of
/// the same name are unreachable and are not emitted, which also keeps
/// label definitions unique.
pub fn lower(program: &Program, analysis: Analysis) -> IrProgram {
    let mut globals = GlobalTable::default();
    let constants = StandardStrings {
        eoln: globals.intern("\n"),
        truth: globals.intern("True"),
        falsity: globals.intern("False"),
        none: globals.intern("None"),
    };
    // The input runtime's 80-character buffer, reserved up front.
    let _ = globals.intern(&" ".repeat(80));

    let last_of_name: Vec<bool> = program
        .definitions
        .iter()
        .enumerate()
        .map(|(i, d)| {
            !program.definitions[i + 1..]
                .iter()
                .any(|later| later.name == d.name)
        })
        .collect();

    let mut definitions = Vec::new();
    for ((definition, symbols), reachable) in program
        .definitions
        .iter()
        .zip(analysis.definition_symbols)
        .zip(last_of_name)
    {
        if !reachable {
            log::debug!("skipping shadowed definition '{}'", definition.name);
            continue;
        }
        definitions.push(lower_function(
            &definition.name,
            &definition.body,
            symbols,
            &mut globals,
            &constants,
        ));
    }

    let main = lower_function(
        "main",
        &program.main,
        analysis.main_symbols,
        &mut globals,
        &constants,
    );

    IrProgram {
        globals,
        main,
        definitions,
    }
}

/// Wraps a body in its prologue and epilogue. `return` statements jump to
/// the `<name>_done` label so there is a single exit.
fn lower_function(
    name: &str,
    body: &Block,
    mut symbols: SymbolTable,
    globals: &mut GlobalTable,
    constants: &StandardStrings,
) -> IrFunction {
    log::debug!("lowering '{name}'");
    let exit_label = format!("{name}_done");
    let mut lowering = FunctionLowering {
        symbols: &mut symbols,
        globals,
        constants,
        code: Vec::new(),
    };
    lowering.code.push(Instruction::Label(name.to_string()));
    lowering.code.push(Instruction::Enter);
    lowering.lower_block(body, &exit_label);
    lowering.code.push(Instruction::Label(exit_label));
    lowering.code.push(Instruction::Leave);

    let code = lowering.code;
    IrFunction {
        name: name.to_string(),
        symbols,
        code,
    }
}

struct FunctionLowering<'a> {
    symbols: &'a mut SymbolTable,
    globals: &'a mut GlobalTable,
    constants: &'a StandardStrings,
    code: Vec<Instruction>,
}

impl FunctionLowering<'_> {
    fn lower_block(&mut self, block: &Block, exit_label: &str) {
        for statement in &block.statements {
            self.lower_statement(statement, exit_label);
        }
    }

    fn lower_statement(&mut self, statement: &Statement, exit_label: &str) {
        match statement {
            Statement::Intro {
                name, expression, ..
            }
            | Statement::Assign {
                name, expression, ..
            } => self.lower_expression(expression, name),

            Statement::PlusAssign {
                name, expression, ..
            }
            | Statement::MinusAssign {
                name, expression, ..
            }
            | Statement::TimesAssign {
                name, expression, ..
            } => {
                let src1 = self.symbols.add_temp(expression.checked_type());
                self.code.push(Instruction::Move {
                    dst: src1.clone(),
                    src: name.clone(),
                });
                let src2 = self.symbols.add_temp(expression.checked_type());
                self.lower_expression(expression, &src2);
                let dst = name.clone();
                self.code.push(match statement {
                    Statement::PlusAssign { .. } => Instruction::Add { dst, src1, src2 },
                    Statement::MinusAssign { .. } => Instruction::Sub { dst, src1, src2 },
                    _ => Instruction::Mult { dst, src1, src2 },
                });
            }

            Statement::Print { args, .. } => {
                for arg in args {
                    self.lower_print_argument(arg);
                    let eoln = self.symbols.add_temp(Type::Str);
                    self.code.push(Instruction::SetLabel {
                        dst: eoln.clone(),
                        label: self.constants.eoln.clone(),
                    });
                    self.code.push(Instruction::PutString { src: eoln });
                }
            }

            Statement::Pass { .. } => self.code.push(Instruction::Nop),

            Statement::While {
                condition, body, ..
            } => {
                let loop_label = self.globals.fresh_label();
                let body_label = self.globals.fresh_label();
                let done_label = self.globals.fresh_label();
                self.code.push(Instruction::Label(loop_label.clone()));
                self.lower_condition(condition, &body_label, &done_label);
                self.code.push(Instruction::Label(body_label));
                self.lower_block(body, exit_label);
                self.code.push(Instruction::Jump(loop_label));
                self.code.push(Instruction::Label(done_label));
            }

            Statement::IfElse {
                condition,
                then_block,
                else_block,
                ..
            } => {
                let then_label = self.globals.fresh_label();
                let else_label = self.globals.fresh_label();
                let done_label = self.globals.fresh_label();
                self.lower_condition(condition, &then_label, &else_label);
                self.code.push(Instruction::Label(then_label));
                self.lower_block(then_block, exit_label);
                self.code.push(Instruction::Jump(done_label.clone()));
                self.code.push(Instruction::Label(else_label));
                self.lower_block(else_block, exit_label);
                self.code.push(Instruction::Label(done_label));
            }

            Statement::Return { value: None, .. } => {
                let temp = self.symbols.add_temp(Type::None);
                self.code.push(Instruction::Set {
                    dst: temp.clone(),
                    value: 0,
                });
                self.code.push(Instruction::Return { src: temp });
                self.code.push(Instruction::Jump(exit_label.to_string()));
            }

            Statement::Return {
                value: Some(expression),
                ..
            } => {
                let temp = self.symbols.add_temp(expression.checked_type());
                self.lower_expression(expression, &temp);
                self.code.push(Instruction::Return { src: temp });
                self.code.push(Instruction::Jump(exit_label.to_string()));
            }

            Statement::Call { name, args, .. } => {
                // Same as a call expression, with the return value ignored.
                self.lower_call(name, args);
            }
        }
    }

    fn lower_print_argument(&mut self, arg: &Expression) {
        match arg.checked_type() {
            Type::Int => {
                let temp = self.symbols.add_temp(Type::Int);
                self.lower_expression(arg, &temp);
                self.code.push(Instruction::PutInt { src: temp });
            }
            Type::Str => {
                let temp = self.symbols.add_temp(Type::Str);
                self.lower_expression(arg, &temp);
                self.code.push(Instruction::PutString { src: temp });
            }
            Type::Bool => {
                let true_label = self.globals.fresh_label();
                let false_label = self.globals.fresh_label();
                let done_label = self.globals.fresh_label();
                let temp = self.symbols.add_temp(Type::Bool);
                self.lower_condition(arg, &true_label, &false_label);
                self.code.push(Instruction::Label(true_label));
                self.code.push(Instruction::SetLabel {
                    dst: temp.clone(),
                    label: self.constants.truth.clone(),
                });
                self.code.push(Instruction::Jump(done_label.clone()));
                self.code.push(Instruction::Label(false_label));
                self.code.push(Instruction::SetLabel {
                    dst: temp.clone(),
                    label: self.constants.falsity.clone(),
                });
                self.code.push(Instruction::Label(done_label));
                self.code.push(Instruction::PutString { src: temp });
            }
            Type::None => {
                // Evaluate for effect, then print the canonical text.
                let dummy = self.symbols.add_temp(Type::None);
                self.lower_expression(arg, &dummy);
                let temp = self.symbols.add_temp(Type::Str);
                self.code.push(Instruction::SetLabel {
                    dst: temp.clone(),
                    label: self.constants.none.clone(),
                });
                self.code.push(Instruction::PutString { src: temp });
            }
        }
    }

    /// Evaluates the arguments left to right, then fills the argument slots
    /// in reverse so each temporary is consumed as late as possible.
    fn lower_call(&mut self, name: &str, args: &[Expression]) {
        let mut sources = Vec::new();
        for arg in args {
            let temp = self.symbols.add_temp(arg.checked_type());
            self.lower_expression(arg, &temp);
            sources.push(temp);
        }
        while let Some(src) = sources.pop() {
            self.code.push(Instruction::Arg {
                index: sources.len(),
                src,
            });
        }
        self.code.push(Instruction::Call(name.to_string()));
    }

    /// Value mode: place the expression's result in `dst`.
    fn lower_expression(&mut self, expression: &Expression, dst: &str) {
        match &expression.kind {
            ExpressionKind::Literal(Value::Int(n)) => self.code.push(Instruction::Set {
                dst: dst.to_string(),
                value: *n,
            }),
            ExpressionKind::Literal(Value::Bool(b)) => self.code.push(Instruction::Set {
                dst: dst.to_string(),
                value: if *b { 1 } else { 0 },
            }),
            ExpressionKind::Literal(Value::None) => self.code.push(Instruction::Set {
                dst: dst.to_string(),
                value: 0,
            }),
            ExpressionKind::Literal(Value::Str(s)) => {
                let label = self.globals.intern(s);
                self.code.push(Instruction::SetLabel {
                    dst: dst.to_string(),
                    label,
                });
            }

            ExpressionKind::Variable(name) => self.code.push(Instruction::Move {
                dst: dst.to_string(),
                src: name.clone(),
            }),

            ExpressionKind::Binary(op, left, right) => match op {
                BinaryOperator::Add
                | BinaryOperator::Subtract
                | BinaryOperator::Multiply
                | BinaryOperator::Divide
                | BinaryOperator::Remainder => {
                    if expression.checked_type() != Type::Int {
                        // String `+` has no word-sized lowering; the
                        // interpreter is the back end that supports it.
                        return;
                    }
                    let src1 = self.symbols.add_temp(left.checked_type());
                    let src2 = self.symbols.add_temp(right.checked_type());
                    self.lower_expression(left, &src1);
                    self.lower_expression(right, &src2);
                    let dst = dst.to_string();
                    self.code.push(match op {
                        BinaryOperator::Add => Instruction::Add { dst, src1, src2 },
                        BinaryOperator::Subtract => Instruction::Sub { dst, src1, src2 },
                        BinaryOperator::Multiply => Instruction::Mult { dst, src1, src2 },
                        BinaryOperator::Divide => Instruction::Div { dst, src1, src2 },
                        _ => Instruction::Mod { dst, src1, src2 },
                    });
                }
                BinaryOperator::LessThan
                | BinaryOperator::LessOrEqual
                | BinaryOperator::Equal
                | BinaryOperator::And
                | BinaryOperator::Or => self.materialise_condition(expression, dst),
            },

            ExpressionKind::Not(_) => self.materialise_condition(expression, dst),

            ExpressionKind::Input(prompt) => {
                let temp = self.symbols.add_temp(Type::Str);
                self.lower_expression(prompt, &temp);
                self.code.push(Instruction::PutString { src: temp });
                self.code.push(Instruction::GetInt {
                    dst: dst.to_string(),
                });
            }

            // Conversions are free: every value is already one word.
            ExpressionKind::IntCast(operand) | ExpressionKind::StrCast(operand) => {
                self.lower_expression(operand, dst);
            }

            ExpressionKind::Call(name, args) => {
                self.lower_call(name, args);
                self.code.push(Instruction::ReturnValue {
                    dst: dst.to_string(),
                });
            }
        }
    }

    /// The standard true/false materialisation for a boolean-producing
    /// expression in value mode.
    fn materialise_condition(&mut self, expression: &Expression, dst: &str) {
        let true_label = self.globals.fresh_label();
        let false_label = self.globals.fresh_label();
        let done_label = self.globals.fresh_label();
        self.lower_condition(expression, &true_label, &false_label);
        self.code.push(Instruction::Label(true_label));
        self.code.push(Instruction::Set {
            dst: dst.to_string(),
            value: 1,
        });
        self.code.push(Instruction::Jump(done_label.clone()));
        self.code.push(Instruction::Label(false_label));
        self.code.push(Instruction::Set {
            dst: dst.to_string(),
            value: 0,
        });
        self.code.push(Instruction::Label(done_label));
    }

    /// Condition mode: jump to `if_true` when the expression is truthy,
    /// `if_false` otherwise.
    fn lower_condition(&mut self, expression: &Expression, if_true: &str, if_false: &str) {
        match &expression.kind {
            ExpressionKind::Binary(
                op @ (BinaryOperator::LessThan | BinaryOperator::LessOrEqual | BinaryOperator::Equal),
                left,
                right,
            ) => {
                let condition = match op {
                    BinaryOperator::LessThan => Compare::LessThan,
                    BinaryOperator::LessOrEqual => Compare::LessOrEqual,
                    _ => Compare::Equal,
                };
                let src1 = self.symbols.add_temp(left.checked_type());
                let src2 = self.symbols.add_temp(right.checked_type());
                self.lower_expression(left, &src1);
                self.lower_expression(right, &src2);
                self.code.push(Instruction::BranchCompare {
                    condition,
                    src1,
                    src2,
                    if_true: if_true.to_string(),
                    if_false: if_false.to_string(),
                });
            }

            ExpressionKind::Binary(BinaryOperator::And, left, right) => {
                let mid_label = self.globals.fresh_label();
                self.lower_condition(left, &mid_label, if_false);
                self.code.push(Instruction::Label(mid_label));
                self.lower_condition(right, if_true, if_false);
            }

            ExpressionKind::Binary(BinaryOperator::Or, left, right) => {
                let mid_label = self.globals.fresh_label();
                self.lower_condition(left, if_true, &mid_label);
                self.code.push(Instruction::Label(mid_label));
                self.lower_condition(right, if_true, if_false);
            }

            ExpressionKind::Not(operand) => self.lower_condition(operand, if_false, if_true),

            ExpressionKind::Literal(Value::Bool(b)) => {
                let target = if *b { if_true } else { if_false };
                self.code.push(Instruction::Jump(target.to_string()));
            }

            ExpressionKind::Variable(name) => self.code.push(Instruction::BranchZero {
                condition: ZeroCompare::GreaterThanZero,
                src: name.clone(),
                if_true: if_true.to_string(),
                if_false: if_false.to_string(),
            }),

            // Default: materialise the value and branch on it.
            _ => {
                let temp = self.symbols.add_temp(expression.checked_type());
                self.lower_expression(expression, &temp);
                self.code.push(Instruction::BranchZero {
                    condition: ZeroCompare::GreaterThanZero,
                    src: temp,
                    if_true: if_true.to_string(),
                    if_false: if_false.to_string(),
                });
            }
        }
    }
}
