use std::{fs, path::Path, path::PathBuf, process::Command};

const INSTANCE: &str = r#"{
  "climate_factors": ["Heat", "Rain"],
  "destinations": ["Coast", "Mountain"],
  "abm_parameters": {
    "state_by_destination_step_factor": [
      [[0.2, 0.3], [0.3, 0.3], [0.4, 0.3], [0.5, 0.3]],
      [[0.4, 0.4], [0.4, 0.4], [0.4, 0.4], [0.4, 0.4]]
    ],
    "mean_tourist_preferences_by_factor": [-0.6, -0.4],
    "tourist_preferences_deviation": 0.1,
    "availability_by_destination": [0.9, 0.8],
    "num_destinations": 2,
    "num_tourists": 200,
    "num_steps": 4
  }
}
"#;

const HISTORY: &str = "Year,Share Coast,Share Mountain\n\
                       2000,0.55,0.45\n\
                       2001,0.52,0.48\n\
                       2002,0.50,0.50\n\
                       2003,0.47,0.53\n";

const CONFIG: &str = r#"[input]
instance = "instance.json"
history = "history.csv"

[simulation]
mc = 3
num_workers = 2
track_agents = true

[calibration]
calibrate_states = true
calibrate_preferences = true
variation_range = 0.2
destinations = [0]
int_upper = 20
initial_gene = 10
max_evaluations = 6
"#;

fn run_bin(args: &[&str]) {
    let bin = PathBuf::from(env!("CARGO_BIN_EXE_sustour"));

    let output = Command::new(bin)
        .args(args)
        .output()
        .expect("failed to execute command");

    let stdout_str =
        std::str::from_utf8(&output.stdout).expect("failed to convert stdout to string");
    let stderr_str =
        std::str::from_utf8(&output.stderr).expect("failed to convert stderr to string");

    assert!(
        output.status.success(),
        "failed to run binary with {args:?}\nstdout:\n{stdout_str}\nstderr:\n{stderr_str}\n"
    );
}

fn setup(name: &str, config: &str) -> PathBuf {
    let test_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join(name);

    fs::remove_dir_all(&test_dir).ok();
    fs::create_dir(&test_dir).expect("failed to create test directory");

    fs::write(test_dir.join("instance.json"), INSTANCE).expect("failed to write instance file");
    fs::write(test_dir.join("history.csv"), HISTORY).expect("failed to write history file");
    fs::write(test_dir.join("config.toml"), config).expect("failed to write config file");

    test_dir
}

fn read_json(file: &Path) -> serde_json::Value {
    let contents = fs::read_to_string(file).expect("failed to read output file");
    serde_json::from_str(&contents).expect("failed to parse output file")
}

#[test]
fn basic_workflow() {
    let test_dir = setup("basic_workflow", CONFIG);
    let test_dir_str = test_dir
        .to_str()
        .expect("failed to convert test directory to string");

    run_bin(&["--sim-dir", test_dir_str, "simulate"]);
    run_bin(&["--sim-dir", test_dir_str, "simulate"]);

    let run_0 = test_dir.join("run-0000");
    let run_1 = test_dir.join("run-0001");
    assert!(run_0.join("raw.msgpack").is_file());
    assert_eq!(
        fs::read(run_0.join("summary.json")).unwrap(),
        fs::read(run_1.join("summary.json")).unwrap()
    );

    let summary = read_json(&run_0.join("summary.json"));
    assert_eq!(summary["steps"].as_array().unwrap().len(), 4);
    assert_eq!(summary["aggregates"].as_array().unwrap().len(), 4);

    run_bin(&["--sim-dir", test_dir_str, "calibrate"]);

    let run_2 = test_dir.join("run-0002");
    let calibration = read_json(&run_2.join("calibration.json"));
    assert_eq!(calibration["genes"].as_array().unwrap().len(), 4);
    assert!(calibration["evaluations"].as_u64().unwrap() <= 6);
    assert!(run_2.join("calibrated_instance.json").is_file());

    run_bin(&[
        "--sim-dir",
        test_dir_str,
        "policy",
        "--destination",
        "0",
        "--start",
        "1",
        "--end",
        "4",
        "--levels",
        "0.5,1.0",
    ]);

    let policy = read_json(&test_dir.join("run-0003").join("policy.json"));
    let final_share = policy["final_share"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&final_share));

    run_bin(&["--sim-dir", test_dir_str, "clean"]);
    assert!(!run_0.exists());
    assert!(!test_dir.join("run-0003").exists());

    fs::remove_dir_all(&test_dir).ok();
}

#[test]
fn invalid_config_fails() {
    let test_dir = setup("invalid_config_fails", &CONFIG.replace("mc = 3", "mc = 0"));

    let output = Command::new(env!("CARGO_BIN_EXE_sustour"))
        .args(["--sim-dir", test_dir.to_str().unwrap(), "simulate"])
        .output()
        .expect("failed to execute command");

    assert!(!output.status.success());
    assert!(!test_dir.join("run-0000").exists());

    fs::remove_dir_all(&test_dir).ok();
}

#[test]
fn calibration_from_initial_values() {
    let config = CONFIG.replace(
        "max_evaluations = 6",
        "max_evaluations = 2\ninitial_reals = [0.0, 0.0, -0.6, -0.4]",
    );
    let test_dir = setup("calibration_from_initial_values", &config);
    let test_dir_str = test_dir
        .to_str()
        .expect("failed to convert test directory to string");

    run_bin(&["--sim-dir", test_dir_str, "calibrate"]);

    let calibration = read_json(&test_dir.join("run-0000").join("calibration.json"));
    let genes: Vec<_> = calibration["genes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|gene| gene.as_i64().unwrap())
        .collect();
    assert_eq!(genes.len(), 4);
    assert!(genes.iter().all(|gene| (8..=12).contains(gene)));

    let bad_config = config.replace("[0.0, 0.0, -0.6, -0.4]", "[0.0, 0.0, -0.6]");
    fs::write(test_dir.join("config.toml"), bad_config).expect("failed to write config file");
    let output = Command::new(env!("CARGO_BIN_EXE_sustour"))
        .args(["--sim-dir", test_dir_str, "calibrate"])
        .output()
        .expect("failed to execute command");
    assert!(!output.status.success());

    fs::remove_dir_all(&test_dir).ok();
}
