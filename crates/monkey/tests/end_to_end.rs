//! Source-to-value scenarios exercised against both execution engines.

fn eval_display(src: &str) -> String {
    monkey::eval(src, &mut |_| {}).unwrap().to_string()
}

fn run_display(src: &str) -> String {
    monkey::run(src, &mut |_| {}).unwrap().to_string()
}

macro_rules! both_engines {
    ($name:ident, $src:expr, $expected:expr) => {
        #[test]
        fn $name() {
            assert_eq!(eval_display($src), $expected);
            assert_eq!(run_display($src), $expected);
        }
    };
}

both_engines!(arithmetic_precedence, "1 + 2 * 3 - 4 / 2", "5");
both_engines!(let_bindings_and_reuse, "let a = 5; let b = a + 5; b * 2;", "20");
both_engines!(len_of_a_string, r#"len("hello world")"#, "11");
both_engines!(
    recursive_function_closures,
    "let counter = fn(x) { if (x > 100) { return x; } else { let foo = x + 1; counter(foo); } }; counter(0);",
    "101"
);
both_engines!(
    higher_order_functions,
    "let apply = fn(f, x) { f(x) }; let double = fn(x) { x * 2 }; apply(double, 10);",
    "20"
);
both_engines!(array_indexing, "[1, 2, 3][1 + 1]", "3");
both_engines!(dict_indexing, r#"{"name": "monkey", "age": 1}["name"]"#, "monkey");
both_engines!(
    map_via_push_and_recursion,
    "let map = fn(arr, f) { let iter = fn(arr, acc) { if (len(arr) == 0) { acc } else { iter(rest(arr), push(acc, f(first(arr)))) } }; iter(arr, []) }; let double = fn(x) { x * 2 }; map([1, 2, 3], double);",
    "[2, 4, 6]"
);

#[test]
fn parser_errors_are_reported_without_panicking() {
    let err = monkey::parse("let = 5;").unwrap_err();
    let rendered = err.to_string();
    assert!(rendered.contains("expected next token to be"));
}

#[test]
fn undefined_variable_is_a_compile_error_on_the_vm_path() {
    let err = monkey::run("foobar", &mut |_| {}).unwrap_err();
    assert!(err.to_string().contains("undefined variable"));
}

#[test]
fn undefined_variable_is_an_error_value_on_the_eval_path() {
    let result = monkey::eval("foobar", &mut |_| {}).unwrap();
    assert_eq!(result.to_string(), "identifier not found: foobar");
}

#[test]
fn puts_builtin_forwards_to_the_caller_supplied_sink() {
    let mut lines = Vec::new();
    monkey::eval(r#"puts("hello", "world")"#, &mut |line| lines.push(line.to_owned())).unwrap();
    assert_eq!(lines, vec!["hello".to_owned(), "world".to_owned()]);

    let mut vm_lines = Vec::new();
    monkey::run(r#"puts("hello", "world")"#, &mut |line| vm_lines.push(line.to_owned())).unwrap();
    assert_eq!(vm_lines, vec!["hello".to_owned(), "world".to_owned()]);
}

#[test]
fn division_by_zero_is_an_error_value_on_the_eval_path() {
    let result = monkey::eval("1 / 0", &mut |_| {}).unwrap();
    assert_eq!(result.to_string(), "ERROR: division by zero");
}

#[test]
fn division_by_zero_is_a_vm_error_on_the_vm_path() {
    let err = monkey::run("1 / 0", &mut |_| {}).unwrap_err();
    assert!(err.to_string().contains("division by zero"));
}
