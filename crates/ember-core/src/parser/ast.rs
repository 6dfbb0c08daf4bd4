//! Abstract syntax tree
//!
//! A program is a list of expressions; statements are expressions whose value
//! is ignored. Method bodies are reference counted so proc objects can share
//! them with the tree they were parsed from.

use std::rc::Rc;

/// Expression node
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `nil`
    Nil,
    /// `true`
    True,
    /// `false`
    False,
    /// `self`
    SelfRef,
    /// Integer literal
    Int(i64),
    /// String literal
    Str(Rc<str>),
    /// Local variable read
    Local(String),
    /// Instance variable read (`@name`)
    Ivar(String),
    /// Constant read
    Const(String),
    /// `name = value`
    AssignLocal(String, Box<Expr>),
    /// `@name = value`
    AssignIvar(String, Box<Expr>),
    /// Method call
    Call(Call),
    /// `!expr`
    Not(Box<Expr>),
    /// `a && b`
    And(Box<Expr>, Box<Expr>),
    /// `a || b`
    Or(Box<Expr>, Box<Expr>),
    /// `if` / `elsif` / `else`
    If {
        /// Condition
        cond: Box<Expr>,
        /// Taken branch
        then_body: Vec<Expr>,
        /// `elsif` chains nest here
        else_body: Vec<Expr>,
    },
    /// `def name(params) ... end`
    Def(Rc<MethodDef>),
    /// `class Name < Super ... end`
    Class {
        /// Constant name
        name: String,
        /// Superclass expression
        superclass: Option<Box<Expr>>,
        /// Class body, evaluated with the class as `self`
        body: Vec<Expr>,
    },
    /// `begin ... rescue ... else ... ensure ... end`
    Begin(Box<Begin>),
}

/// Method call
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    /// Receiver; `None` calls on `self`
    pub recv: Option<Box<Expr>>,
    /// Method name
    pub name: String,
    /// Arguments
    pub args: Vec<Expr>,
    /// Bare identifier with no receiver and no arguments; a missing method
    /// reports "undefined local variable or method"
    pub vcall: bool,
}

/// Method definition
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDef {
    /// Method name
    pub name: String,
    /// Parameter names
    pub params: Vec<String>,
    /// Body
    pub body: Vec<Expr>,
}

/// `begin` block
#[derive(Debug, Clone, PartialEq)]
pub struct Begin {
    /// Protected body
    pub body: Vec<Expr>,
    /// `rescue` clauses, tried in order
    pub rescues: Vec<RescueClause>,
    /// `else` body, run when the body did not raise
    pub else_body: Option<Vec<Expr>>,
    /// `ensure` body, run on every exit
    pub ensure: Option<Vec<Expr>>,
}

/// One `rescue` clause
#[derive(Debug, Clone, PartialEq)]
pub struct RescueClause {
    /// Class expressions; empty means `StandardError`
    pub classes: Vec<Expr>,
    /// `=> name` binding
    pub var: Option<String>,
    /// Handler body
    pub body: Vec<Expr>,
}
