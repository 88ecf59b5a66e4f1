use std::path::Path;

const RULE_TYPES: &[&str] = &["single", "homo", "hetero", "abspecific", "lowf"];

fn main() {
    let rules_path = Path::new("rules/default_rules.json");
    validate_rules_file(rules_path);
    set_build_dependencies();
}

fn validate_rules_file(rules_path: &Path) {
    // Ensure rules exist at build time
    assert!(
        rules_path.exists(),
        "\n\nRULES BUILD ERROR: File not found\n\
         Path: {}\n\
         Please create the default rule file before building.\n",
        rules_path.display()
    );

    let contents = std::fs::read_to_string(rules_path).unwrap_or_else(|e| {
        panic!(
            "\n\nRULES BUILD ERROR: Failed to read file\n\
             Path: {}\n\
             Error: {e}\n",
            rules_path.display()
        );
    });

    let document: serde_json::Value = serde_json::from_str(&contents).unwrap_or_else(|e| {
        panic!(
            "\n\nRULES BUILD ERROR: Invalid JSON\n\
             Path: {}\n\
             Error: {e}\n\
             Hint: Check for missing commas, brackets, or invalid syntax.\n",
            rules_path.display()
        );
    });

    validate_rules_structure(&document);
}

fn validate_rules_structure(document: &serde_json::Value) {
    assert!(
        document.is_object(),
        "\n\nRULES BUILD ERROR: Root must be a JSON object\n\
         Got: {document}\n"
    );

    let rules = document.get("rules").unwrap_or_else(|| {
        panic!(
            "\n\nRULES BUILD ERROR: Missing 'rules' field\n\
             The rule file must have a top-level 'rules' array.\n"
        );
    });

    let rules = rules.as_array().unwrap_or_else(|| {
        panic!(
            "\n\nRULES BUILD ERROR: 'rules' must be an array\n\
             Got: {rules}\n"
        );
    });

    for (i, rule) in rules.iter().enumerate() {
        validate_rule_fields(rule, i);
    }

    println!(
        "cargo:warning=Validated default rules: {} records",
        rules.len()
    );
}

fn validate_rule_fields(rule: &serde_json::Value, index: usize) {
    let target = rule
        .get("target_antigen")
        .and_then(|v| v.as_str())
        .unwrap_or("<unknown>");

    let rule_type = rule.get("rule_type").and_then(|v| v.as_str());
    assert!(
        rule_type.is_some(),
        "\n\nRULES BUILD ERROR: Rule at index {index} missing 'rule_type' field\n"
    );
    assert!(
        rule.get("target_antigen").and_then(|v| v.as_str()).is_some(),
        "\n\nRULES BUILD ERROR: Rule at index {index} missing 'target_antigen' field\n"
    );

    if let Some(rule_type) = rule_type {
        assert!(
            RULE_TYPES.contains(&rule_type),
            "\n\nRULES BUILD ERROR: Rule for '{target}' (index {index}) has unknown type '{rule_type}'\n\
             Expected one of: {}\n",
            RULE_TYPES.join(", ")
        );
    }

    assert!(
        rule.get("rule_data").is_some_and(serde_json::Value::is_object),
        "\n\nRULES BUILD ERROR: Rule for '{target}' (index {index}) missing 'rule_data' object\n"
    );
}

fn set_build_dependencies() {
    // Tell cargo to rerun if the rules change
    println!("cargo:rerun-if-changed=rules/default_rules.json");

    // Tell cargo to rerun if build.rs changes
    println!("cargo:rerun-if-changed=build.rs");
}
