//! `push_neg` snippets
//!
//! The Lean server has no negation endpoint. Instead each statement is
//! compiled together with a small meta program that pushes `¬` through its
//! type and prints a ready-to-prove declaration header as an `info`
//! message.

use conjecturer::cascade::{CheckResult, NegationRequest, Severity};

/// Imports every negation snippet needs
const REQUIRED_IMPORTS: [&str; 3] = ["import Lean", "import Mathlib", "import Aesop"];

/// Split leading `import` lines from the rest of a Lean source
pub fn split_imports(source: &str) -> (Vec<&str>, String) {
    let lines: Vec<&str> = source.lines().collect();
    let split = lines
        .iter()
        .position(|line| !line.trim_start().starts_with("import "))
        .unwrap_or(lines.len());
    let imports = lines[..split].iter().map(|l| l.trim()).collect();
    (imports, lines[split..].join("\n").trim().to_string())
}

/// Keyword and name of the declaration a statement header opens
pub fn parse_decl_header(statement: &str) -> Option<(String, String)> {
    let re = regex::Regex::new(r"(?m)^\s*(theorem|lemma|def)\s+([A-Za-z_][A-Za-z0-9_.]*)\b").ok()?;
    re.captures(statement)
        .map(|caps| (caps[1].to_string(), caps[2].to_string()))
}

/// Give an `example` a constant the meta program can look up
fn name_anonymous(statement: &str, name: &str) -> String {
    let trimmed = statement.trim_start();
    match trimmed.strip_prefix("example") {
        Some(tail) if tail.starts_with(char::is_whitespace) || tail.starts_with(':') => {
            format!("theorem {name}{tail}")
        }
        _ => statement.to_string(),
    }
}

/// Lean snippet printing the negation of `request.statement`
///
/// Only the statement is searched for the declaration name, so context
/// declarations are never negated. Anonymous statements become
/// `theorem anon_{index}`.
pub fn negation_snippet(request: &NegationRequest, index: usize) -> String {
    let (context_imports, context_rest) = split_imports(&request.context);
    let mut imports: Vec<&str> = REQUIRED_IMPORTS.to_vec();
    for line in context_imports {
        if !imports.contains(&line) {
            imports.push(line);
        }
    }

    let (keyword, name, statement) = match parse_decl_header(&request.statement) {
        Some((kw, name)) => (kw, name, request.statement.trim().to_string()),
        None => {
            let name = format!("anon_{index}");
            let statement = name_anonymous(request.statement.trim(), &name);
            ("theorem".to_string(), name, statement)
        }
    };
    let emit = if keyword == "lemma" { "lemma" } else { "theorem" };
    let rest = if context_rest.is_empty() {
        statement
    } else {
        format!("{context_rest}\n\n{statement}")
    };

    format!(
        r#"{imports}

open Classical
open Lean Elab Tactic

{rest} sorry

def _pushNegExpr (ty : Lean.Expr) : Lean.Meta.MetaM Lean.Expr := do
  let gExpr ← Lean.Meta.mkFreshExprMVar ty
  let g := gExpr.mvarId!
  let (gs, _) ← Lean.Elab.runTactic g (← `(tactic| open Classical in push_neg))
  let g' := gs.headD g
  let ty' ← Lean.MVarId.getType g'
  Lean.instantiateMVars ty'

#eval! Lean.Meta.MetaM.run' do
  let P ← Lean.Meta.inferType (← Lean.Meta.mkConstWithFreshMVarLevels ``{name})
  let notP := Lean.mkApp (Lean.mkConst ``Not) P
  let e' ← _pushNegExpr notP
  let fmt ← Lean.PrettyPrinter.ppExpr e'
  IO.println ("{emit} neg_{name} : " ++ fmt.pretty ++ " := by")
"#,
        imports = imports.join("\n"),
    )
}

/// The printed header, if the snippet ran
pub fn extract_negation(result: &CheckResult) -> Option<String> {
    if result.error.is_some() {
        return None;
    }
    result
        .response
        .messages
        .iter()
        .find(|m| m.severity == Severity::Info)
        .map(|m| m.data.trim().to_string())
        .filter(|header| header.ends_with(":= by"))
}
