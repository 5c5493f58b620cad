// Display formatting for expression DAGs
//
// Output is fully parenthesized infix with C-style calls, e.g.
// `((xd[0])+(sin(u[1])))` and `(pow(xd[0],3))`. Shared subexpressions are
// printed at every use.
use crate::Expr;
use crate::node::ExprKind;
use std::fmt;

fn write_number(f: &mut fmt::Formatter<'_>, n: f64) -> fmt::Result {
    if n.is_nan() {
        write!(f, "NaN")
    } else if n.is_infinite() {
        if n > 0.0 {
            write!(f, "INFINITY")
        } else {
            write!(f, "(-INFINITY)")
        }
    } else if n < 0.0 {
        write!(f, "({n})")
    } else {
        write!(f, "{n}")
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            ExprKind::Variable(v) => write!(f, "{}[{}]", v.id.var_type.prefix(), v.id.component),

            ExprKind::Constant { value, .. } => write_number(f, *value),

            ExprKind::Unary { op, arg } => write!(f, "({}({}))", op.name(), arg),

            ExprKind::PowerInt { arg, exponent } => match exponent {
                1 => write!(f, "({arg})"),
                // Self-product form for code generators
                2 if arg.is_variable() => write!(f, "(({arg})*({arg}))"),
                n => write!(f, "(pow({arg},{n}))"),
            },

            ExprKind::Binary { op, lhs, rhs } => {
                let def = op.definition();
                match def.symbol {
                    Some(symbol) => write!(f, "({lhs}{symbol}{rhs})"),
                    None => write!(f, "({}({lhs},{rhs}))", def.name),
                }
            }

            ExprKind::External { function, arg } => write!(f, "({}({}))", function.name, arg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::BinaryOp;
    use crate::{ExternalFunction, VariableType};
    use std::sync::Arc;

    fn xd0() -> Expr {
        Expr::variable(VariableType::DifferentialState, 0, 0)
    }

    #[test]
    fn test_power_int_forms() {
        assert_eq!(xd0().powi(1).to_string(), "(xd[0])");
        assert_eq!(xd0().powi(2).to_string(), "((xd[0])*(xd[0]))");
        assert_eq!(xd0().powi(3).to_string(), "(pow(xd[0],3))");
        assert_eq!(xd0().powi(-1).to_string(), "(pow(xd[0],-1))");
        // Only a bare variable gets the self-product form
        assert_eq!(xd0().sin().powi(2).to_string(), "(pow((sin(xd[0])),2))");
    }

    #[test]
    fn test_operators() {
        let u = Expr::variable(VariableType::Control, 1, 1);
        assert_eq!(
            Expr::binary(BinaryOp::Add, xd0(), u.asin()).to_string(),
            "(xd[0]+(asin(u[1])))"
        );
        assert_eq!(
            Expr::binary(BinaryOp::Pow, xd0(), Expr::constant(0.5)).to_string(),
            "(pow(xd[0],0.5))"
        );
        assert_eq!(
            Expr::binary(BinaryOp::Mul, Expr::constant(-2.0), u).to_string(),
            "((-2)*u[1])"
        );
    }

    #[test]
    fn test_external_and_constants() {
        let f = Arc::new(ExternalFunction::new("myfun", |v| v, |_| 1.0, |_| 0.0));
        assert_eq!(Expr::external(f, xd0()).to_string(), "(myfun(xd[0]))");
        assert_eq!(Expr::constant(f64::NAN).to_string(), "NaN");
        assert_eq!(Expr::constant(1.5).to_string(), "1.5");
    }
}
