use std::process::ExitCode;

use anyhow::Result;

const EXAMPLE: &str = r#"Examples:
    $ export WDM_DEPENDENCY_FILE=...
    $ wdm test has_nfd
    $ wdm ensure has_gpu_operator
---
name: cluster_configuration
namespace: gpu-operator
---
name: has_gpu_operator
spec:
  requirements:
  - has_nfd
  configuration:
  - namespace
  test:
  - name: has_gpu_operator_pod
    type: shell
    spec: oc get pod -l app.kubernetes.io/component=gpu-operator -n "$namespace" -oname
  install:
  - name: deploy_gpu_operator
    type: toolbox
    spec:
      group: gpu_operator
      command: deploy_from_operatorhub
  - name: wait_gpu_operator
    type: toolbox
    spec:
      group: gpu_operator
      command: wait_deployment
---
name: has_nfd
spec:
  test:
  - name: has_nfd_labels
    type: shell
    spec: ./run_toolbox.py nfd has_labels
  install:
  - name: install_nfd_from_operatorhub
    type: shell
    spec: ./run_toolbox.py nfd_operator deploy_from_operatorhub
"#;

pub fn execute() -> Result<ExitCode> {
    println!("{}", EXAMPLE);
    Ok(ExitCode::SUCCESS)
}
