use std::env;
use std::fs;
use std::process;

use warp_lang::diagnostics::{emit_syntax_errors, report_trace_error};
use warp_lang::language::parser::parse_program;
use warp_lang::trace::value::DType;
use warp_lang::trace::{ArgSpec, trace_function};

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 4 {
        eprintln!("Usage: ./warp-lang trace <filename.warp> <kernel> [arg-spec...]");
        eprintln!("  arg-spec: c:<int> | s:<dtype> | p:<dtype> | t:<dtype>:<dims> | (spec,...)");
        process::exit(1);
    }

    let command = &args[1];
    let filename = &args[2];
    let kernel = &args[3];

    if !filename.ends_with(".warp") {
        eprintln!("Invalid file extension. Only .warp files are allowed.");
        process::exit(1);
    }

    let content = fs::read_to_string(filename).unwrap_or_else(|err| {
        eprintln!("Failed to read {filename}: {err}");
        process::exit(1);
    });

    match command.as_str() {
        "trace" => {
            let program = match parse_program(&content) {
                Ok(program) => program,
                Err(errors) => {
                    emit_syntax_errors(filename, &content, &errors);
                    process::exit(1);
                }
            };

            let mut specs = Vec::new();
            for raw in &args[4..] {
                match parse_arg_spec(raw) {
                    Ok(spec) => specs.push(spec),
                    Err(message) => {
                        eprintln!("Invalid argument spec `{raw}`: {message}");
                        process::exit(1);
                    }
                }
            }

            match trace_function(&program, kernel, &specs) {
                Ok(output) => {
                    for op in &output.ops {
                        println!("{op}");
                    }
                    println!("result: {}", output.result.describe());
                }
                Err(err) => {
                    report_trace_error(filename, &content, &err);
                    process::exit(1);
                }
            }
        }
        _ => {
            eprintln!("Invalid command. Usage: ./warp-lang trace <filename.warp> <kernel> [arg-spec...]");
            process::exit(1);
        }
    }
}

fn parse_arg_spec(text: &str) -> Result<ArgSpec, String> {
    let text = text.trim();
    if let Some(inner) = text.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
        let mut specs = Vec::new();
        for part in split_top_level(inner) {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            specs.push(parse_arg_spec(part)?);
        }
        return Ok(ArgSpec::Tuple(specs));
    }
    if let Some(value) = text.strip_prefix("c:") {
        return value
            .parse::<i64>()
            .map(ArgSpec::Constexpr)
            .map_err(|_| format!("`{value}` is not an integer"));
    }
    if let Some(dtype) = text.strip_prefix("s:") {
        return Ok(ArgSpec::Scalar(parse_dtype(dtype)?));
    }
    if let Some(dtype) = text.strip_prefix("p:") {
        return Ok(ArgSpec::Pointer(parse_dtype(dtype)?));
    }
    if let Some(rest) = text.strip_prefix("t:") {
        let (dtype, dims) = rest
            .split_once(':')
            .ok_or_else(|| "tensor specs look like t:<dtype>:<dims>".to_string())?;
        let shape = dims
            .split('x')
            .map(|dim| dim.parse::<usize>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| format!("`{dims}` is not a shape like 4x4"))?;
        return Ok(ArgSpec::Tensor(parse_dtype(dtype)?, shape));
    }
    Err("expected c:, s:, p:, t: or a parenthesized tuple".to_string())
}

fn parse_dtype(text: &str) -> Result<DType, String> {
    match text {
        "i32" => Ok(DType::I32),
        "i64" => Ok(DType::I64),
        "f32" => Ok(DType::F32),
        "f64" => Ok(DType::F64),
        other => Err(format!("unknown dtype `{other}`")),
    }
}

fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (offset, ch) in text.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&text[start..offset]);
                start = offset + 1;
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}
