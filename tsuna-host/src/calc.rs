//! シミュレーションホスト用の式評価器
//!
//! GDBの式言語のうち、整数演算・`$`変数の参照と代入・引数なしの関数呼び出しだけを扱います。
//! エラーはGDBと同じ文言のメッセージとして返します。

/// 式の値
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    Int(u64),
    /// 未設定のコンビニエンス変数
    Void,
}

/// 式評価が参照する環境
pub trait Env {
    /// `$name` を読む（`name` は `$` を除いた部分。`$` 単体は空文字、`$3` は `"3"`）
    fn read_var(&self, name: &str) -> Result<Value, String>;

    /// `$name` に書き込む
    fn write_var(&mut self, name: &str, value: u64) -> Result<(), String>;

    /// 引数なしの関数を呼び出す
    fn call(&mut self, func: &str) -> Result<u64, String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Num(u64),
    Var(String),
    Ident(String),
    Op(&'static str),
    LParen,
    RParen,
}

const OPERATORS: &[&str] = &[
    "<<", ">>", "==", "!=", "<=", ">=", "&&", "||", "+", "-", "*", "/", "%", "&", "|", "^", "~",
    "!", "<", ">", "=",
];

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let bytes = input.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i] as char;
        if c.is_ascii_whitespace() {
            i += 1;
        } else if c.is_ascii_digit() {
            let start = i;
            while i < bytes.len() && (bytes[i] as char).is_ascii_alphanumeric() {
                i += 1;
            }
            tokens.push(Token::Num(parse_number(&input[start..i])?));
        } else if c == '$' {
            let start = i + 1;
            i += 1;
            while i < bytes.len() && ((bytes[i] as char).is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            tokens.push(Token::Var(input[start..i].to_string()));
        } else if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < bytes.len() && ((bytes[i] as char).is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            tokens.push(Token::Ident(input[start..i].to_string()));
        } else if c == '(' {
            tokens.push(Token::LParen);
            i += 1;
        } else if c == ')' {
            tokens.push(Token::RParen);
            i += 1;
        } else if let Some(op) = OPERATORS.iter().find(|op| input[i..].starts_with(**op)) {
            tokens.push(Token::Op(*op));
            i += op.len();
        } else {
            return Err(format!("Invalid character '{}' in expression.", c));
        }
    }

    Ok(tokens)
}

fn parse_number(text: &str) -> Result<u64, String> {
    let lower = text.to_ascii_lowercase();
    let parsed = if let Some(hex) = lower.strip_prefix("0x") {
        u64::from_str_radix(hex, 16)
    } else {
        lower.parse::<u64>()
    };
    parsed.map_err(|_| "Invalid number \"".to_string() + text + "\".")
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    env: &'a mut dyn Env,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn eat_op(&mut self, ops: &[&str]) -> Option<&'static str> {
        match self.peek() {
            Some(Token::Op(op)) if ops.contains(op) => {
                let op = *op;
                self.pos += 1;
                Some(op)
            }
            _ => None,
        }
    }

    fn assignment(&mut self) -> Result<Value, String> {
        if let (Some(Token::Var(name)), Some(Token::Op("="))) =
            (self.tokens.get(self.pos), self.tokens.get(self.pos + 1))
        {
            let name = name.clone();
            self.pos += 2;
            let value = int(self.assignment()?)?;
            self.env.write_var(&name, value)?;
            return self.env.read_var(&name);
        }
        self.binary(0)
    }

    /// 優先順位の低い順に並べた二項演算子
    fn binary(&mut self, level: usize) -> Result<Value, String> {
        const LEVELS: &[&[&str]] = &[
            &["||"],
            &["&&"],
            &["|"],
            &["^"],
            &["&"],
            &["==", "!="],
            &["<", ">", "<=", ">="],
            &["<<", ">>"],
            &["+", "-"],
            &["*", "/", "%"],
        ];

        if level == LEVELS.len() {
            return self.unary();
        }

        let mut lhs = self.binary(level + 1)?;
        while let Some(op) = self.eat_op(LEVELS[level]) {
            let rhs = self.binary(level + 1)?;
            lhs = Value::Int(apply(op, int(lhs)?, int(rhs)?)?);
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Value, String> {
        if let Some(op) = self.eat_op(&["-", "~", "!", "+"]) {
            let v = int(self.unary()?)?;
            return Ok(Value::Int(match op {
                "-" => v.wrapping_neg(),
                "~" => !v,
                "!" => (v == 0) as u64,
                _ => v,
            }));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Value, String> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| "A syntax error in expression, near `'.".to_string())?;
        self.pos += 1;

        match token {
            Token::Num(n) => Ok(Value::Int(n)),
            Token::Var(name) => self.env.read_var(&name),
            Token::Ident(name) => {
                if self.peek() == Some(&Token::LParen)
                    && self.tokens.get(self.pos + 1) == Some(&Token::RParen)
                {
                    self.pos += 2;
                    return self.env.call(&name).map(Value::Int);
                }
                Err(format!("No symbol \"{}\" in current context.", name))
            }
            Token::LParen => {
                let value = self.assignment()?;
                if self.peek() != Some(&Token::RParen) {
                    return Err("A syntax error in expression, near `'.".to_string());
                }
                self.pos += 1;
                Ok(value)
            }
            _ => Err("A syntax error in expression, near `'.".to_string()),
        }
    }
}

fn int(value: Value) -> Result<u64, String> {
    match value {
        Value::Int(v) => Ok(v),
        Value::Void => Err("Argument to arithmetic operation not a number or boolean.".to_string()),
    }
}

fn apply(op: &str, a: u64, b: u64) -> Result<u64, String> {
    Ok(match op {
        "+" => a.wrapping_add(b),
        "-" => a.wrapping_sub(b),
        "*" => a.wrapping_mul(b),
        "/" | "%" if b == 0 => return Err("Division by zero".to_string()),
        "/" => a / b,
        "%" => a % b,
        "<<" => a.wrapping_shl(b as u32),
        ">>" => a.wrapping_shr(b as u32),
        "&" => a & b,
        "|" => a | b,
        "^" => a ^ b,
        "==" => (a == b) as u64,
        "!=" => (a != b) as u64,
        "<" => (a < b) as u64,
        ">" => (a > b) as u64,
        "<=" => (a <= b) as u64,
        ">=" => (a >= b) as u64,
        "&&" => (a != 0 && b != 0) as u64,
        "||" => (a != 0 || b != 0) as u64,
        _ => return Err(format!("Unsupported operator {}", op)),
    })
}

/// 式を評価する
pub fn eval(input: &str, env: &mut dyn Env) -> Result<Value, String> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err("Argument required (expression to compute).".to_string());
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        env,
    };
    let value = parser.assignment()?;
    if parser.pos != parser.tokens.len() {
        return Err("A syntax error in expression, near `'.".to_string());
    }
    Ok(value)
}
