//! The evaluation context of one module: functions, `var`, `local`,
//! `terraform` and `path`.

use crate::types::{Block, Module};

use hcl::eval::{Context, Evaluate, FuncArgs, FuncDef, ParamType};
use hcl::{Body, Expression, Map, Number, Value};
use std::path::Path;

/// Build the context of a module, without its locals.
pub(crate) fn module_context(module: &Module, working_dir: &Path, workspace: &str) -> Context<'static> {
    let mut ctx = Context::new();
    declare_functions(&mut ctx);

    ctx.declare_var("var", Value::Object(declared_variables(module)));

    let mut terraform = Map::new();
    terraform.insert("workspace".to_string(), Value::from(workspace));
    ctx.declare_var("terraform", Value::Object(terraform));

    let mut path = Map::new();
    path.insert("module".to_string(), path_value(&module.module_path));
    path.insert("root".to_string(), path_value(&module.root_path));
    path.insert("cwd".to_string(), path_value(working_dir));
    ctx.declare_var("path", Value::Object(path));

    ctx
}

fn path_value(path: &Path) -> Value {
    Value::from(path.display().to_string())
}

/// Values of the variables a module declares: the input value if there is
/// one, the declared default otherwise. Variables with neither are left out.
fn declared_variables(module: &Module) -> Map<String, Value> {
    let empty = Context::new();
    let mut vars = Map::new();

    for block in module.blocks_of_type("variable") {
        let Some(name) = block.name() else { continue };

        if let Some(value) = module.variables.get(name) {
            vars.insert(name.to_string(), value.clone());
            continue;
        }

        match block.attribute("default").map(|attr| attr.expr().evaluate(&empty)) {
            Some(Ok(value)) => {
                vars.insert(name.to_string(), value);
            }
            Some(Err(e)) => {
                tracing::debug!(variable = %name, error = %e, "Could not evaluate variable default");
            }
            None => {}
        }
    }

    vars
}

/// Names of the variables a module declares without a default, which no
/// source provided a value for.
pub(crate) fn missing_variables(module: &Module) -> Vec<String> {
    let mut missing: Vec<String> = module
        .blocks_of_type("variable")
        .filter(|block| block.attribute("default").is_none())
        .filter_map(Block::name)
        .filter(|name| !module.variables.contains(name))
        .map(String::from)
        .collect();
    missing.sort();
    missing.dedup();
    missing
}

/// Evaluate the `locals` blocks of a module.
///
/// Locals may reference each other in any order, so evaluation is repeated
/// until a pass resolves nothing new. Locals that never resolve are left out.
pub(crate) fn resolve_locals(blocks: &[Block], ctx: &Context<'_>) -> Map<String, Value> {
    let mut pending: Vec<(String, &Expression)> = blocks
        .iter()
        .filter(|b| b.block_type == "locals")
        .flat_map(|b| b.body.attributes().map(|attr| (attr.key().to_string(), attr.expr())))
        .collect();
    let mut resolved = Map::new();

    while !pending.is_empty() {
        let mut scope = ctx.clone();
        scope.declare_var("local", Value::Object(resolved.clone()));

        let before = pending.len();
        pending.retain(|(name, expr)| match expr.evaluate(&scope) {
            Ok(value) => {
                resolved.insert(name.clone(), value);
                false
            }
            Err(_) => true,
        });

        if pending.len() == before {
            break;
        }
    }

    for (name, _) in &pending {
        tracing::debug!(local = %name, "Could not evaluate local value");
    }

    resolved
}

/// The values of a body: every attribute that evaluates, and nested blocks
/// as arrays of objects keyed by block type.
pub(crate) fn body_values(body: &Body, ctx: &Context<'_>) -> Map<String, Value> {
    let mut values = Map::new();

    for attr in body.attributes() {
        match attr.expr().evaluate(ctx) {
            Ok(value) => {
                values.insert(attr.key().to_string(), value);
            }
            Err(e) => {
                tracing::debug!(attribute = %attr.key(), error = %e, "Leaving attribute unevaluated");
            }
        }
    }

    for block in body.blocks() {
        let nested = Value::Object(body_values(block.body(), ctx));
        let entry = values
            .entry(block.identifier().to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(items) = entry {
            items.push(nested);
        }
    }

    values
}

fn declare_functions(ctx: &mut Context<'_>) {
    ctx.declare_func("lower", FuncDef::builder().param(ParamType::String).build(lower));
    ctx.declare_func("upper", FuncDef::builder().param(ParamType::String).build(upper));
    ctx.declare_func("trimspace", FuncDef::builder().param(ParamType::String).build(trimspace));
    ctx.declare_func("length", FuncDef::builder().param(ParamType::Any).build(length));
    ctx.declare_func("tostring", FuncDef::builder().param(ParamType::Any).build(tostring));
    ctx.declare_func(
        "lookup",
        FuncDef::builder()
            .param(ParamType::Any)
            .param(ParamType::String)
            .variadic_param(ParamType::Any)
            .build(lookup),
    );
}

fn string_arg(args: &FuncArgs, name: &str) -> Result<String, String> {
    match args.first() {
        Some(Value::String(s)) => Ok(s.clone()),
        _ => Err(format!("{name}: expected a string argument")),
    }
}

fn lower(args: FuncArgs) -> Result<Value, String> {
    string_arg(&args, "lower").map(|s| Value::from(s.to_lowercase()))
}

fn upper(args: FuncArgs) -> Result<Value, String> {
    string_arg(&args, "upper").map(|s| Value::from(s.to_uppercase()))
}

fn trimspace(args: FuncArgs) -> Result<Value, String> {
    string_arg(&args, "trimspace").map(|s| Value::from(s.trim()))
}

fn length(args: FuncArgs) -> Result<Value, String> {
    let len = match args.first() {
        Some(Value::String(s)) => s.chars().count(),
        Some(Value::Array(items)) => items.len(),
        Some(Value::Object(entries)) => entries.len(),
        _ => return Err("length: argument must be a string, list or map".to_string()),
    };
    Ok(Value::Number(Number::from(len as u64)))
}

fn tostring(args: FuncArgs) -> Result<Value, String> {
    match args.first() {
        Some(Value::String(s)) => Ok(Value::from(s.as_str())),
        Some(Value::Number(n)) => Ok(Value::from(n.to_string())),
        Some(Value::Bool(b)) => Ok(Value::from(b.to_string())),
        _ => Err("tostring: only primitive values can be converted".to_string()),
    }
}

fn lookup(args: FuncArgs) -> Result<Value, String> {
    let (Some(Value::Object(map)), Some(Value::String(key))) = (args.first(), args.get(1)) else {
        return Err("lookup: expected a map and a string key".to_string());
    };
    match (map.get(key), args.get(2)) {
        (Some(value), _) => Ok(value.clone()),
        (None, Some(default)) => Ok(default.clone()),
        (None, None) => Err(format!("lookup: key '{key}' not found and no default given")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn eval(ctx: &Context<'_>, expr: &str) -> Value {
        let body = hcl::parse(&format!("v = {expr}")).unwrap();
        let attr = body.attributes().next().unwrap();
        attr.expr().evaluate(ctx).unwrap()
    }

    fn functions() -> Context<'static> {
        let mut ctx = Context::new();
        declare_functions(&mut ctx);
        ctx
    }

    #[test]
    fn test_string_functions() {
        let ctx = functions();
        assert_eq!(eval(&ctx, r#"lower("ABC")"#), Value::from("abc"));
        assert_eq!(eval(&ctx, r#"upper("abc")"#), Value::from("ABC"));
        assert_eq!(eval(&ctx, r#"trimspace("  x ")"#), Value::from("x"));
        assert_eq!(eval(&ctx, "tostring(true)"), Value::from("true"));
    }

    #[test]
    fn test_length() {
        let ctx = functions();
        assert_eq!(eval(&ctx, r#"length(["a", "b"])"#), Value::Number(Number::from(2u64)));
        assert_eq!(eval(&ctx, r#"length("héllo")"#), Value::Number(Number::from(5u64)));
    }

    #[test]
    fn test_lookup_with_and_without_default() {
        let ctx = functions();
        assert_eq!(eval(&ctx, r#"lookup({ a = "x" }, "a")"#), Value::from("x"));
        assert_eq!(eval(&ctx, r#"lookup({ a = "x" }, "b", "fallback")"#), Value::from("fallback"));
    }

    #[test]
    fn test_locals_resolve_in_any_order() {
        let body = hcl::parse(
            r#"
locals {
  full = "${local.prefix}-app"
  prefix = lower("PROD")
  broken = var.nope
}
"#,
        )
        .unwrap();
        let block = body.blocks().next().unwrap().clone();
        let blocks = vec![Block {
            block_type: "locals".to_string(),
            labels: Vec::new(),
            body: block.body,
            filename: "main.tf".into(),
            module_path: Vec::new(),
            values: Map::new(),
        }];

        let locals = resolve_locals(&blocks, &functions());
        assert_eq!(locals.get("prefix"), Some(&Value::from("prod")));
        assert_eq!(locals.get("full"), Some(&Value::from("prod-app")));
        assert!(!locals.contains_key("broken"));
    }

    #[test]
    fn test_locals_see_module_variables() {
        let body = hcl::parse(
            r#"
locals {
  bucket = "${var.env}-${local.suffix}"
  suffix = "logs"
}
"#,
        )
        .unwrap();
        let block = body.blocks().next().unwrap().clone();
        let blocks = vec![Block {
            block_type: "locals".to_string(),
            labels: Vec::new(),
            body: block.body,
            filename: "main.tf".into(),
            module_path: Vec::new(),
            values: Map::new(),
        }];
        let mut ctx = functions();
        let mut vars = Map::new();
        vars.insert("env".to_string(), Value::from("prod"));
        ctx.declare_var("var", Value::Object(vars));

        let locals = resolve_locals(&blocks, &ctx);
        assert_eq!(locals.get("bucket"), Some(&Value::from("prod-logs")));

        // the passes work on copies; the module context gains no `local`
        let local_ref = hcl::parse("v = local.suffix").unwrap();
        assert!(local_ref.attributes().next().unwrap().expr().evaluate(&ctx).is_err());
    }

    #[test]
    fn test_body_values_collects_nested_blocks() {
        let body = hcl::parse(
            r#"
name = "web"
ingress {
  port = "80"
}
ingress {
  port = "443"
}
"#,
        )
        .unwrap();

        let values = body_values(&body, &Context::new());
        assert_eq!(values.get("name"), Some(&Value::from("web")));
        let Some(Value::Array(ingress)) = values.get("ingress") else {
            panic!("expected ingress blocks");
        };
        assert_eq!(ingress.len(), 2);
    }
}
