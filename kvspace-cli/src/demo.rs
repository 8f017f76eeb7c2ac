use kvspace_core::Value;
use kvspace_redis::RedisEngine;
use serde_json::json;

use crate::render;

const DEMO_KEYS: [&str; 4] = ["user:1001", "config:theme", "counter", "session:abc"];

pub fn run_demo(engine: &RedisEngine) {
    let namespace = engine.prefix().unwrap_or("<root>");
    println!("Running kvspace demo in namespace '{}'", namespace);

    // Single-key writes
    let profile = json!({"name": "ann", "age": 25, "tags": ["admin", "ops"]});
    report("create user:1001", engine.create("user:1001", profile, Some(3600)));
    report("create config:theme", engine.create("config:theme", "dark", None));
    report("create counter", engine.create("counter", 41, None));

    // Reads with and without parsing
    for key in ["user:1001", "config:theme", "counter"] {
        match engine.read(key, true) {
            Some(value) => println!("read {} -> {}", key, describe(&value)),
            None => println!("read {} -> (nil)", key),
        }
    }
    if let Some(raw) = engine.read("user:1001", false) {
        println!("raw user:1001 -> {}", render(&raw));
    }

    report("update counter", engine.update("counter", 42, None));
    println!("exists counter -> {}", engine.exists("counter"));

    // TTL handling
    println!("ttl user:1001 -> {}", engine.get_ttl("user:1001"));
    println!("ttl config:theme -> {}", engine.get_ttl("config:theme"));
    report("expire config:theme 120", engine.set_expire("config:theme", 120));
    println!("ttl config:theme -> {}", engine.get_ttl("config:theme"));

    // Batch write in one pipeline
    let batch = vec![
        ("session:abc", Value::from("token-abc")),
        ("session:def", Value::from("token-def")),
    ];
    report("batch create sessions", engine.batch_create(batch, Some(600)));

    let mut listed = engine.get_all_keys("*");
    listed.sort();
    println!("keys -> {:?}", listed);
    println!("keys session:* -> {}", engine.get_all_keys("session:*").len());

    // Clean up everything the demo wrote
    report("delete session:def", engine.delete("session:def"));
    let removed = engine.batch_delete(&DEMO_KEYS);
    println!("batch delete -> {} removed", removed);
    println!("ttl counter after delete -> {}", engine.get_ttl("counter"));
}

fn report(step: &str, ok: bool) {
    println!("{} -> {}", step, if ok { "ok" } else { "failed" });
}

fn describe(value: &Value) -> String {
    let kind = match value {
        Value::Text(_) => "text",
        Value::Integer(_) => "integer",
        Value::Float(_) => "float",
        Value::Record(_) => "record",
    };
    format!("{} ({})", render(value).replace('\n', ""), kind)
}
