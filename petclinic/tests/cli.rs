use std::fs;

use assert_cmd::Command;
use rstest::*;

const IMAGES: [(&str, &str); 4] = [
  ("PETCLINIC_UI_IMAGE", "img-ui"),
  ("PETCLINIC_CUSTOMER_IMAGE", "img-cust"),
  ("PETCLINIC_VETS_IMAGE", "img-vets"),
  ("PETCLINIC_VISITS_IMAGE", "img-visits"),
];

fn petclinic() -> Command {
  let mut cmd = Command::cargo_bin("petclinic").unwrap();
  cmd.env_remove("PETCLINIC_CONFIG");
  for (var, _) in IMAGES {
    cmd.env_remove(var);
  }
  cmd
}

fn with_images() -> Command {
  let mut cmd = petclinic();
  cmd.envs(IMAGES);
  cmd
}

fn stdout(cmd: &mut Command) -> String {
  let output = cmd.assert().success().get_output().stdout.clone();
  String::from_utf8(output).unwrap()
}

#[rstest]
#[case("/owners/1", "petclinic-customer-service:80\n")]
#[case("/vets", "petclinic-vets-service:80\n")]
#[case("/visits/new", "petclinic-visits-service:80\n")]
#[case("/", "petclinic-ui-service:80\n")]
#[case("/welcome", "petclinic-ui-service:80\n")]
fn route_test(#[case] path: &str, #[case] expected: &str) {
  petclinic().arg("route").arg(path).assert().success().stdout(expected.to_owned());
}

#[test]
fn it_prints_controller_policy() {
  let policy: serde_json::Value = serde_json::from_str(&stdout(petclinic().arg("policy"))).unwrap();
  let statements = policy["Statement"].as_array().unwrap();

  assert_eq!(policy["Version"], "2012-10-17");
  assert_eq!(statements.len(), 11);
  assert!(statements.iter().all(|s| s["Effect"] == "Allow"));
}

#[test]
fn it_synthesizes_json_graph() {
  let graph: serde_json::Value =
    serde_json::from_str(&stdout(with_images().args(["synth", "--format", "json"]))).unwrap();
  let resources = graph["resources"].as_array().unwrap();

  let count = |kind: &str| resources.iter().filter(|r| r["type"] == kind).count();
  assert_eq!(count("Kubernetes::Deployment"), 4);
  assert_eq!(count("Kubernetes::Service"), 4);
  assert_eq!(count("Kubernetes::Namespace"), 1);
  assert_eq!(count("Kubernetes::Ingress"), 1);
  assert_eq!(count("AWS::RDS::DBCluster"), 1);
  assert_eq!(graph["outputs"][0]["name"], "ClusterName");
}

#[test]
fn it_prefers_flags_over_config_file() {
  let dir = tempfile::tempdir().unwrap();
  let config = dir.path().join("petclinic.toml");
  fs::write(
    &config,
    r#"
ui_image = "file-ui"
customer_image = "file-cust"
vets_image = "file-vets"
visits_image = "file-visits"
"#,
  )
  .unwrap();

  let manifests = stdout(
    petclinic()
      .arg("manifests")
      .arg("--config")
      .arg(&config)
      .args(["--vets-image", "flag-vets"]),
  );

  assert_eq!(manifests.matches("---\n").count(), 11);
  assert!(manifests.contains("image: file-ui"));
  assert!(manifests.contains("image: flag-vets"));
  assert!(!manifests.contains("image: file-vets"));
}

#[test]
fn it_writes_manifest_files() {
  let dir = tempfile::tempdir().unwrap();
  with_images()
    .args(["synth", "--output-dir"])
    .arg(dir.path())
    .assert()
    .success();

  let mut files: Vec<String> = fs::read_dir(dir.path())
    .unwrap()
    .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
    .collect();
  files.sort();

  assert_eq!(files.len(), 11);
  assert_eq!(files[0], "00-namespace-petclinic-namespace.yaml");
  assert_eq!(files[1], "01-serviceaccount-aws-load-balancer-controller.yaml");
  assert!(files.last().unwrap().ends_with("-ingress-petclinic-ingress.yaml"));
}

#[test]
fn it_plans_namespace_before_workloads() {
  let plan = stdout(with_images().arg("plan"));
  let lines: Vec<&str> = plan.lines().collect();
  let position = |id: &str| lines.iter().position(|l| l.split(' ').nth(1) == Some(id)).unwrap();

  assert_eq!(lines[0], "AWS::EC2::VPC Vpc");
  for id in ["deployment-ui", "service-ui", "deployment-visits", "service-visits"] {
    assert!(position("namespace") < position(id));
  }
  assert!(lines
    .iter()
    .any(|l| l.starts_with("Kubernetes::Service service-vets <- ") && l.ends_with("namespace")));
}

#[test]
fn it_fails_without_images() {
  petclinic().arg("synth").assert().failure();
}

#[test]
fn it_rejects_malformed_image() {
  with_images().args(["plan", "--ui-image", "Not An Image"]).assert().failure();
}
