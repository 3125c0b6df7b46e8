use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::configs::string_map;

/// A single executable step, discriminated by its `type` field
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Task {
    #[serde(rename = "shell")]
    Shell(ShellTask),
    #[serde(rename = "ansible", alias = "automation")]
    Automation(AutomationTask),
    #[serde(rename = "predefined")]
    Predefined(PredefinedTask),
    #[serde(rename = "toolbox")]
    Toolbox(ToolboxTask),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShellTask {
    pub name: String,
    #[serde(default)]
    pub configuration: Vec<String>,
    /// Script body, passed as-is to `bash -c`
    pub spec: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AutomationTask {
    pub name: String,
    #[serde(default)]
    pub configuration: Vec<String>,
    /// Ansible task records, wrapped into a single local play at run time
    pub spec: Vec<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PredefinedTask {
    pub name: String,
    #[serde(default)]
    pub configuration: Vec<String>,
    pub spec: PredefinedSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PredefinedSpec {
    pub name: String,
    #[serde(default, deserialize_with = "string_map")]
    pub args: IndexMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolboxTask {
    pub name: String,
    #[serde(default)]
    pub configuration: Vec<String>,
    pub spec: ToolboxSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolboxSpec {
    pub group: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl Task {
    pub fn name(&self) -> &str {
        match self {
            Task::Shell(task) => &task.name,
            Task::Automation(task) => &task.name,
            Task::Predefined(task) => &task.name,
            Task::Toolbox(task) => &task.name,
        }
    }

    /// Configuration keys this task needs on top of its dependency's
    pub fn configuration(&self) -> &[String] {
        match self {
            Task::Shell(task) => &task.configuration,
            Task::Automation(task) => &task.configuration,
            Task::Predefined(task) => &task.configuration,
            Task::Toolbox(task) => &task.configuration,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Task::Shell(_) => "shell",
            Task::Automation(_) => "ansible",
            Task::Predefined(_) => "predefined",
            Task::Toolbox(_) => "toolbox",
        }
    }

    /// Clone of this task under another name
    pub fn renamed(&self, name: impl Into<String>) -> Task {
        let mut task = self.clone();
        let name = name.into();
        match &mut task {
            Task::Shell(t) => t.name = name,
            Task::Automation(t) => t.name = name,
            Task::Predefined(t) => t.name = name,
            Task::Toolbox(t) => t.name = name,
        }
        task
    }
}

pub fn parse_task(value: Value) -> Result<Task, serde_yaml::Error> {
    serde_yaml::from_value(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_task_type_by_tag() {
        let yaml = r#"
- name: check
  type: shell
  spec: |
    which tool
- name: play
  type: ansible
  configuration: [namespace]
  spec:
  - name: say hello
    debug: msg=hello
- name: reuse
  type: predefined
  spec:
    name: deploy
    args:
      replicas: 3
      enabled: true
- name: tb
  type: toolbox
  spec:
    group: cluster
    command: capture_state
    args: [--namespace, $namespace]
"#;
        let tasks: Vec<Task> = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(tasks.len(), 4);
        assert!(matches!(&tasks[0], Task::Shell(t) if t.spec.trim() == "which tool"));
        match &tasks[1] {
            Task::Automation(t) => {
                assert_eq!(t.configuration, vec!["namespace".to_string()]);
                assert_eq!(t.spec.len(), 1);
            }
            other => panic!("expected automation task, got {:?}", other),
        }
        match &tasks[2] {
            Task::Predefined(t) => {
                assert_eq!(t.spec.name, "deploy");
                assert_eq!(t.spec.args.get("replicas").map(String::as_str), Some("3"));
                assert_eq!(t.spec.args.get("enabled").map(String::as_str), Some("true"));
            }
            other => panic!("expected predefined task, got {:?}", other),
        }
        match &tasks[3] {
            Task::Toolbox(t) => {
                assert_eq!(t.spec.group, "cluster");
                assert_eq!(t.spec.args, vec!["--namespace", "$namespace"]);
            }
            other => panic!("expected toolbox task, got {:?}", other),
        }
    }

    #[test]
    fn rejects_unknown_task_type() {
        let err = serde_yaml::from_str::<Task>("name: x\ntype: docker\nspec: run\n")
            .expect_err("unknown type should not parse");
        assert!(err.to_string().contains("docker"));
    }

    #[test]
    fn rejects_missing_payload() {
        assert!(serde_yaml::from_str::<Task>("name: x\ntype: shell\n").is_err());
    }

    #[test]
    fn renamed_keeps_payload() {
        let task: Task = serde_yaml::from_str("name: a\ntype: shell\nspec: 'true'\n").unwrap();
        let renamed = task.renamed("b");
        assert_eq!(renamed.name(), "b");
        assert_eq!(renamed.kind(), "shell");
        assert_eq!(task.name(), "a");
    }
}
