//! Desugared `Clone` and `BoundExpression` captures must own independent
//! values: writes through the binding never reach the outer variable, and
//! writes to the outer variable never reach the binding.
//!
//! The checks run the transformed fragments on a small reference-aware
//! interpreter, so an aliasing prelude (e.g. moving a `&T` under a new name)
//! would show up as a changed outer value.

use grasp_diagnostics::DiagnosticCode;
use grasp_parser::{parse_expr, parse_fragment, Block, Expr, ExprKind, Lit, Stmt, UnaryOp};
use grasp_parser::{AssignOp, BinOp};
use grasp_transform::{transform_fragment, DesugarOptions};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Int(i64),
    Bool(bool),
    Unit,
    Tuple(Vec<Value>),
    Struct(BTreeMap<String, Value>),
    Ref(Place),
    Closure(usize),
}

#[derive(Debug, Clone, PartialEq)]
struct Place {
    slot: usize,
    fields: Vec<String>,
}

struct ClosureValue {
    params: Vec<String>,
    body: Expr,
    env: Vec<(String, usize)>,
}

#[derive(Default)]
struct Machine {
    slots: Vec<Value>,
    closures: Vec<ClosureValue>,
}

type Env = Vec<(String, usize)>;

impl Machine {
    fn alloc(&mut self, value: Value) -> usize {
        self.slots.push(value);
        self.slots.len() - 1
    }

    fn lookup(env: &Env, name: &str) -> usize {
        env.iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, slot)| *slot)
            .unwrap_or_else(|| panic!("unbound variable `{}`", name))
    }

    fn read(&self, place: &Place) -> Value {
        let mut value = &self.slots[place.slot];
        for field in &place.fields {
            value = match value {
                Value::Struct(fields) => &fields[field],
                Value::Tuple(elems) => &elems[field.parse::<usize>().unwrap()],
                other => panic!("no field `{}` on {:?}", field, other),
            };
        }
        value.clone()
    }

    fn write(&mut self, place: &Place, new: Value) {
        let mut value = &mut self.slots[place.slot];
        for field in &place.fields {
            value = match value {
                Value::Struct(fields) => fields.get_mut(field).unwrap(),
                Value::Tuple(elems) => &mut elems[field.parse::<usize>().unwrap()],
                other => panic!("no field `{}` on {:?}", field, other),
            };
        }
        *value = new;
    }

    /// Place denoted by `expr`, auto-dereferencing on field access.
    fn place_of(&mut self, expr: &Expr, env: &mut Env) -> Option<Place> {
        match &expr.kind {
            ExprKind::Ident(ident) => Some(Place {
                slot: Self::lookup(env, &ident.name),
                fields: Vec::new(),
            }),
            ExprKind::Field { base, field } => {
                let mut place = match self.place_of(base, env) {
                    Some(place) => place,
                    None => {
                        let value = self.eval(base, env);
                        Place {
                            slot: self.alloc(value),
                            fields: Vec::new(),
                        }
                    }
                };
                while let Value::Ref(target) = self.read(&place) {
                    place = target;
                }
                place.fields.push(field.name.clone());
                Some(place)
            }
            ExprKind::Unary {
                op: UnaryOp::Deref,
                expr,
            } => match self.eval(expr, env) {
                Value::Ref(target) => Some(target),
                other => panic!("cannot dereference {:?}", other),
            },
            ExprKind::Paren(inner) => self.place_of(inner, env),
            _ => None,
        }
    }

    fn int(&mut self, expr: &Expr, env: &mut Env) -> i64 {
        match self.eval(expr, env) {
            Value::Int(n) => n,
            other => panic!("expected integer, got {:?}", other),
        }
    }

    fn eval(&mut self, expr: &Expr, env: &mut Env) -> Value {
        match &expr.kind {
            ExprKind::Lit(Lit::Int(n)) => Value::Int(*n as i64),
            ExprKind::Lit(Lit::Bool(b)) => Value::Bool(*b),
            ExprKind::Lit(Lit::Str(_)) => panic!("strings are not supported"),
            ExprKind::Ident(_) | ExprKind::Field { .. } => {
                let place = self.place_of(expr, env).unwrap();
                self.read(&place)
            }
            ExprKind::Unary { op, expr: inner } => match op {
                UnaryOp::Ref | UnaryOp::RefMut => {
                    let place = match self.place_of(inner, env) {
                        Some(place) => place,
                        None => {
                            let value = self.eval(inner, env);
                            Place {
                                slot: self.alloc(value),
                                fields: Vec::new(),
                            }
                        }
                    };
                    Value::Ref(place)
                }
                UnaryOp::Deref => {
                    let place = self.place_of(expr, env).unwrap();
                    self.read(&place)
                }
                UnaryOp::Neg => Value::Int(-self.int(inner, env)),
                UnaryOp::Not => match self.eval(inner, env) {
                    Value::Bool(b) => Value::Bool(!b),
                    other => panic!("cannot negate {:?}", other),
                },
            },
            ExprKind::Binary { op, lhs, rhs } => {
                let a = self.int(lhs, env);
                let b = self.int(rhs, env);
                match op {
                    BinOp::Add => Value::Int(a + b),
                    BinOp::Sub => Value::Int(a - b),
                    BinOp::Mul => Value::Int(a * b),
                    BinOp::Div => Value::Int(a / b),
                    BinOp::Rem => Value::Int(a % b),
                    BinOp::Eq => Value::Bool(a == b),
                    BinOp::Ne => Value::Bool(a != b),
                    BinOp::Lt => Value::Bool(a < b),
                    BinOp::Le => Value::Bool(a <= b),
                    BinOp::Gt => Value::Bool(a > b),
                    BinOp::Ge => Value::Bool(a >= b),
                    BinOp::And | BinOp::Or => panic!("logical operators take booleans"),
                }
            }
            ExprKind::Assign { op, target, value } => {
                let place = self.place_of(target, env).unwrap();
                let new = match op {
                    AssignOp::Assign => self.eval(value, env),
                    _ => {
                        let Value::Int(old) = self.read(&place) else {
                            panic!("compound assignment on non-integer")
                        };
                        let rhs = self.int(value, env);
                        Value::Int(match op {
                            AssignOp::AddAssign => old + rhs,
                            AssignOp::SubAssign => old - rhs,
                            AssignOp::MulAssign => old * rhs,
                            _ => old / rhs,
                        })
                    }
                };
                self.write(&place, new);
                Value::Unit
            }
            ExprKind::Paren(inner) => self.eval(inner, env),
            ExprKind::Tuple(elems) => {
                Value::Tuple(elems.iter().map(|e| self.eval(e, env)).collect())
            }
            ExprKind::Block(block) => self.block(block, env),
            ExprKind::If {
                cond,
                then_branch,
                else_branch,
            } => match self.eval(cond, env) {
                Value::Bool(true) => self.block(then_branch, env),
                Value::Bool(false) => match else_branch {
                    Some(e) => self.eval(e, env),
                    None => Value::Unit,
                },
                other => panic!("condition is not a boolean: {:?}", other),
            },
            ExprKind::Closure(closure) => {
                // A `move` closure copies every visible binding into its own
                // slots; otherwise it shares the enclosing slots.
                let captured = if closure.is_move {
                    env.iter()
                        .map(|(name, slot)| {
                            let value = self.slots[*slot].clone();
                            (name.clone(), self.alloc(value))
                        })
                        .collect()
                } else {
                    env.clone()
                };
                self.closures.push(ClosureValue {
                    params: closure.params.iter().map(|p| p.name.name.clone()).collect(),
                    body: (*closure.body).clone(),
                    env: captured,
                });
                Value::Closure(self.closures.len() - 1)
            }
            ExprKind::Call { callee, args } => {
                if let ExprKind::Path(segments) = &callee.kind {
                    let names: Vec<_> = segments.iter().map(|s| s.name.as_str()).collect();
                    assert_eq!(names, ["Clone", "clone"], "unknown function");
                    return match self.eval(&args[0], env) {
                        Value::Ref(place) => self.read(&place),
                        other => panic!("Clone::clone expects a reference, got {:?}", other),
                    };
                }
                let Value::Closure(id) = self.eval(callee, env) else {
                    panic!("callee is not a closure")
                };
                let args: Vec<Value> = args.iter().map(|a| self.eval(a, env)).collect();
                let mut call_env = self.closures[id].env.clone();
                let params = self.closures[id].params.clone();
                for (param, arg) in params.into_iter().zip(args) {
                    let slot = self.alloc(arg);
                    call_env.push((param, slot));
                }
                let body = self.closures[id].body.clone();
                self.eval(&body, &mut call_env)
            }
            other => panic!("unsupported expression {:?}", other),
        }
    }

    fn block(&mut self, block: &Block, env: &mut Env) -> Value {
        let mark = env.len();
        for stmt in &block.stmts {
            match stmt {
                Stmt::Let(local) => {
                    let value = match &local.init {
                        Some(init) => self.eval(init, env),
                        None => Value::Unit,
                    };
                    let slot = self.alloc(value);
                    env.push((local.name.name.clone(), slot));
                }
                Stmt::Semi(expr) | Stmt::Expr(expr) => {
                    self.eval(expr, env);
                }
            }
        }
        let value = match &block.tail {
            Some(tail) => self.eval(tail, env),
            None => Value::Unit,
        };
        env.truncate(mark);
        value
    }
}

const RECEIVER: &str = "struct S { some_a: i64, some_b: i64 }\nimpl S;\n";

/// Desugar `source` and run it with `self` bound to `&S { some_a, some_b }`.
fn run_desugared(source: &str, some_a: i64, some_b: i64) -> Value {
    let fragment = parse_fragment(source).unwrap();
    let out = transform_fragment(&fragment, &fragment.type_table(), &DesugarOptions::default());
    assert!(!out.has_errors(), "{:?}", out.diagnostics);
    assert!(out.closures.iter().any(|c| c.transformed));
    run(&out.expr, some_a, some_b)
}

fn run(expr: &Expr, some_a: i64, some_b: i64) -> Value {
    let mut machine = Machine::default();
    let receiver = machine.alloc(Value::Struct(BTreeMap::from([
        ("some_a".to_string(), Value::Int(some_a)),
        ("some_b".to_string(), Value::Int(some_b)),
    ])));
    let this = machine.alloc(Value::Ref(Place {
        slot: receiver,
        fields: Vec::new(),
    }));
    let mut env = vec![("self".to_string(), this)];
    machine.eval(expr, &mut env)
}

fn ints(values: &[i64]) -> Value {
    Value::Tuple(values.iter().map(|v| Value::Int(*v)).collect())
}

#[test]
fn test_clone_binding_mutation_stays_inside() {
    for start in [0, 1, 7, -3] {
        let source = format!(
            "{{ let mut count = {}; let f = [+count] || {{ count += 10; count }}; let r = f(); let r2 = f(); (r, r2, count) }}",
            start
        );
        let expected = ints(&[start + 10, start + 20, start]);
        assert_eq!(run_desugared(&source, 0, 0), expected);
    }
}

#[test]
fn test_outer_mutation_does_not_reach_clone() {
    let source = "{ let mut count = 1; let f = [+count] || count; count = 5; (f(), count) }";
    assert_eq!(run_desugared(source, 0, 0), ints(&[1, 5]));
}

#[test]
fn test_bound_expression_is_independent() {
    let source = "{ let mut base = 4; let f = [n = base * 2] || { n += 1; n }; base = 100; (f(), f(), base) }";
    assert_eq!(run_desugared(source, 0, 0), ints(&[9, 10, 100]));
}

#[test]
fn test_bound_expression_over_reference_owns_its_value() {
    let source = "{ let mut v = 3; let r = &v; let f = [n = *r] || { n += 1; n }; (f(), v) }";
    assert_eq!(run_desugared(source, 0, 0), ints(&[4, 3]));
}

#[test]
fn test_receiver_bound_by_name_is_independent() {
    for (a, b) in [(1, 2), (-4, 0)] {
        let source = format!(
            "{}{{ let f = [s = self] || {{ s.some_a += 5; s.some_a }}; (f(), self.some_a, self.some_b) }}",
            RECEIVER
        );
        assert_eq!(run_desugared(&source, a, b), ints(&[a + 5, a, b]));
    }
}

#[test]
fn test_borrowing_bound_expression_is_refused() {
    let sources = [
        "{ let mut count = 1; let f = [c = &mut count] || { *c += 10; *c }; (f(), count) }",
        "{ let mut count = 1; let f = [c = &count] || *c + 0; count = 5; (f(), count) }",
    ];
    for source in sources {
        let fragment = parse_fragment(source).unwrap();
        let out = transform_fragment(&fragment, &fragment.type_table(), &DesugarOptions::default());
        let codes: Vec<_> = out.diagnostics.iter().map(|d| d.code).collect();
        assert_eq!(codes, [DiagnosticCode::BorrowedBoundExpression], "{}", source);
        assert!(!out.closures.iter().any(|c| c.transformed));
    }
}

#[test]
fn test_field_wildcard_clones_are_independent_of_receiver() {
    for (a, b) in [(1, 2), (0, 0), (40, -5)] {
        let source = format!(
            "{}{{ let f = [+self.*] || {{ self.some_a += 5; self.some_b *= 2; (self.some_a, self.some_b) }}; (f(), self.some_a, self.some_b) }}",
            RECEIVER
        );
        let expected = Value::Tuple(vec![ints(&[a + 5, b * 2]), Value::Int(a), Value::Int(b)]);
        assert_eq!(run_desugared(&source, a, b), expected);
    }
}

#[test]
fn test_receiver_clone_copies_the_aggregate() {
    let source = format!(
        "{}{{ let f = [+self] || {{ self.some_a = 99; self.some_a }}; (f(), self.some_a) }}",
        RECEIVER
    );
    assert_eq!(run_desugared(&source, 1, 2), ints(&[99, 1]));
}

#[test]
fn test_reference_capture_observes_outer_writes() {
    let source = "{ let mut count = 1; let f = [&count] || *count + 0; count = 5; (f(), count) }";
    assert_eq!(run_desugared(source, 0, 0), ints(&[5, 5]));
}

#[test]
fn test_naive_rebinding_of_receiver_aliases() {
    // Moving the receiver reference under a new name keeps it pointing at
    // the original aggregate; the interpreter must detect that.
    let naive = parse_expr(
        "{ let f = { let __cap_self = self; move || { __cap_self.some_a += 5; __cap_self.some_a } }; (f(), self.some_a) }",
    )
    .unwrap();
    assert_eq!(run(&naive, 1, 2), ints(&[6, 6]));

    let source = format!(
        "{}{{ let f = [+self.*] || {{ self.some_a += 5; self.some_a }}; (f(), self.some_a) }}",
        RECEIVER
    );
    assert_eq!(run_desugared(&source, 1, 2), ints(&[6, 1]));
}

#[test]
fn test_legacy_closure_is_the_aliasing_control() {
    let source = "{ let mut count = 1; let f = || { count += 10; count }; (f(), count) }";
    let fragment = parse_fragment(source).unwrap();
    let out = transform_fragment(&fragment, &fragment.type_table(), &DesugarOptions::default());
    assert_eq!(out.expr, fragment.expr);
    assert_eq!(run(&out.expr, 0, 0), ints(&[11, 11]));
}
