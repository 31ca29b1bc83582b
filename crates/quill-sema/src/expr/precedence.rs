//! Operator precedence and the shunting-yard reorder.

/// Binding power of a binary operator by name. Higher binds tighter;
/// unknown operators bind loosest.
pub fn precedence(op: &str) -> u8 {
    match op {
        "||" => 1,
        "&&" => 2,
        "==" | "!=" => 3,
        "<" | ">" | "<=" | ">=" => 4,
        "+" | "-" => 5,
        "*" | "/" | "%" => 6,
        "^" => 7,
        _ => 0,
    }
}

pub fn right_associative(op: &str) -> bool {
    op == "^"
}

/// One element of an infix stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<E, O> {
    Operand(E),
    Operator(O),
}

pub trait InfixOperator: Copy {
    fn precedence(self) -> u8;
    fn right_associative(self) -> bool;
}

/// Reorder an infix stream into postfix (evaluation) order.
pub fn to_postfix<E, O: InfixOperator>(
    input: impl IntoIterator<Item = Token<E, O>>,
) -> Vec<Token<E, O>> {
    let mut output = Vec::new();
    let mut stack: Vec<O> = Vec::new();

    for token in input {
        match token {
            Token::Operand(e) => output.push(Token::Operand(e)),
            Token::Operator(op) => {
                while let Some(&top) = stack.last() {
                    if !should_pop(op, top) {
                        break;
                    }
                    stack.pop();
                    output.push(Token::Operator(top));
                }
                stack.push(op);
            }
        }
    }
    while let Some(op) = stack.pop() {
        output.push(Token::Operator(op));
    }
    output
}

fn should_pop<O: InfixOperator>(new_op: O, top: O) -> bool {
    if new_op.right_associative() {
        new_op.precedence() < top.precedence()
    } else {
        new_op.precedence() <= top.precedence()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq)]
    struct Op(&'static str);

    impl InfixOperator for Op {
        fn precedence(self) -> u8 {
            precedence(self.0)
        }
        fn right_associative(self) -> bool {
            right_associative(self.0)
        }
    }

    fn render(tokens: Vec<Token<&'static str, Op>>) -> String {
        tokens
            .into_iter()
            .map(|t| match t {
                Token::Operand(e) => e,
                Token::Operator(Op(o)) => o,
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn postfix(infix: &[&'static str]) -> String {
        let tokens = infix.iter().enumerate().map(|(i, s)| {
            if i % 2 == 0 {
                Token::Operand(*s)
            } else {
                Token::Operator(Op(s))
            }
        });
        render(to_postfix(tokens))
    }

    #[test]
    fn multiplication_binds_tighter() {
        assert_eq!(postfix(&["a", "+", "b", "*", "c"]), "a b c * +");
        assert_eq!(postfix(&["a", "*", "b", "+", "c"]), "a b * c +");
    }

    #[test]
    fn left_associative_chains() {
        assert_eq!(postfix(&["a", "-", "b", "-", "c"]), "a b - c -");
    }

    #[test]
    fn power_is_right_associative() {
        assert_eq!(postfix(&["a", "^", "b", "^", "c"]), "a b c ^ ^");
    }

    #[test]
    fn comparison_below_arithmetic() {
        assert_eq!(
            postfix(&["a", "+", "b", "<", "c", "&&", "d"]),
            "a b + c < d &&"
        );
    }

    #[test]
    fn unknown_operators_bind_loosest() {
        assert_eq!(precedence("<>"), 0);
        assert_eq!(postfix(&["a", "<>", "b", "||", "c"]), "a b c || <>");
    }
}
