//! 执行结果与报告

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ActionError;
use crate::test_case::TestCaseMetaInfo;
use crate::{ExecutorError, Result};

/// 测试结论
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    Passed,
    Failed,
}

/// 单次测试执行结果
///
/// `cause` 为决定测试失败的错误: 主链失败时为主链错误, 否则为 finally 链错误。
/// `finally_error` 总是记录 finally 链自身的失败 (如有)。
#[derive(Debug, Clone)]
pub struct TestResult {
    pub run_id: Uuid,
    pub test_name: String,
    pub meta_info: TestCaseMetaInfo,
    pub status: TestStatus,
    pub cause: Option<ActionError>,
    pub finally_error: Option<ActionError>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl TestResult {
    pub fn passed(&self) -> bool {
        self.status == TestStatus::Passed
    }

    /// 失败时转换为错误, 供宿主测试框架直接传播
    pub fn ensure_passed(&self) -> Result<()> {
        match &self.cause {
            Some(cause) if !self.passed() => Err(ExecutorError::TestFailed {
                test_name: self.test_name.clone(),
                source: cause.clone(),
            }),
            _ => Ok(()),
        }
    }

    /// 生成可序列化报告
    pub fn to_report(&self) -> TestReport {
        TestReport {
            run_id: self.run_id,
            test_name: self.test_name.clone(),
            meta_info: self.meta_info.clone(),
            status: self.status,
            error: self.cause.as_ref().map(|e| e.cause().to_string()),
            error_type: self.cause.as_ref().map(|e| e.type_name().to_string()),
            failure_path: self
                .cause
                .as_ref()
                .map(|e| e.path().iter().rev().cloned().collect())
                .unwrap_or_default(),
            finally_error: self.finally_error.as_ref().map(|e| e.to_string()),
            started_at: self.started_at,
            finished_at: self.finished_at,
            duration_ms: self.duration_ms,
        }
    }
}

/// 测试报告
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestReport {
    pub run_id: Uuid,

    pub test_name: String,

    #[serde(default)]
    pub meta_info: TestCaseMetaInfo,

    pub status: TestStatus,

    /// 失败原因
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// 失败原因类型名
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,

    /// 失败路径 (由外向内)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failure_path: Vec<String>,

    /// finally 链失败
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finally_error: Option<String>,

    pub started_at: DateTime<Utc>,

    pub finished_at: DateTime<Utc>,

    /// 总耗时（毫秒）
    pub duration_ms: u64,
}

impl TestReport {
    /// 导出为 JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// 导出为 YAML
    pub fn to_yaml(&self) -> serde_yaml::Result<String> {
        serde_yaml::to_string(self)
    }
}

/// 测试套件报告
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
    /// 总用例数
    pub total: usize,

    pub passed: usize,

    pub failed: usize,

    /// 因快速失败而未执行的用例
    pub skipped: Vec<String>,

    /// 总耗时（毫秒）
    pub duration_ms: u64,

    /// 各用例的报告, 与提交顺序一致
    pub reports: Vec<TestReport>,
}

impl SuiteReport {
    pub fn new(reports: Vec<TestReport>, skipped: Vec<String>, duration_ms: u64) -> Self {
        let passed = reports
            .iter()
            .filter(|r| r.status == TestStatus::Passed)
            .count();
        Self {
            total: reports.len() + skipped.len(),
            passed,
            failed: reports.len() - passed,
            skipped,
            duration_ms,
            reports,
        }
    }

    /// 是否全部通过
    pub fn all_passed(&self) -> bool {
        self.failed == 0 && self.skipped.is_empty() && self.passed > 0
    }

    /// 导出为 JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// 导出为 YAML
    pub fn to_yaml(&self) -> serde_yaml::Result<String> {
        serde_yaml::to_string(self)
    }

    /// 保存报告, 根据扩展名选择格式 (默认 JSON)
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = match path.extension().and_then(|s| s.to_str()) {
            Some("yaml") | Some("yml") => self
                .to_yaml()
                .map_err(|e| ExecutorError::SerdeError(e.to_string()))?,
            _ => self
                .to_json()
                .map_err(|e| ExecutorError::SerdeError(e.to_string()))?,
        };
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(name: &str, cause: Option<ActionError>) -> TestResult {
        let now = Utc::now();
        TestResult {
            run_id: Uuid::new_v4(),
            test_name: name.to_string(),
            meta_info: TestCaseMetaInfo::default(),
            status: if cause.is_some() {
                TestStatus::Failed
            } else {
                TestStatus::Passed
            },
            cause,
            finally_error: None,
            started_at: now,
            finished_at: now,
            duration_ms: 5,
        }
    }

    #[test]
    fn test_failed_report_fields() {
        let err = ActionError::failed("boom").within("fail").within("main");
        let report = result("broken", Some(err)).to_report();

        assert_eq!(report.status, TestStatus::Failed);
        assert_eq!(report.error.as_deref(), Some("boom"));
        assert_eq!(report.error_type.as_deref(), Some("ActionFailedError"));
        assert_eq!(report.failure_path, vec!["main", "fail"]);

        let json = report.to_json().unwrap();
        assert!(json.contains("\"status\": \"failed\""));
    }

    #[test]
    fn test_passed_report_omits_errors() {
        let report = result("ok", None).to_report();
        let yaml = report.to_yaml().unwrap();
        assert!(!yaml.contains("error"));
        assert!(!yaml.contains("failure_path"));
    }

    #[test]
    fn test_ensure_passed() {
        assert!(result("ok", None).ensure_passed().is_ok());

        let err = result("broken", Some(ActionError::failed("boom")))
            .ensure_passed()
            .unwrap_err();
        assert!(matches!(err, ExecutorError::TestFailed { ref test_name, .. } if test_name == "broken"));
    }

    #[test]
    fn test_suite_counts() {
        let reports = vec![
            result("a", None).to_report(),
            result("b", Some(ActionError::failed("x"))).to_report(),
        ];
        let suite = SuiteReport::new(reports, vec!["c".to_string()], 10);

        assert_eq!(suite.total, 3);
        assert_eq!(suite.passed, 1);
        assert_eq!(suite.failed, 1);
        assert!(!suite.all_passed());
    }

    #[test]
    fn test_save_suite_report() {
        let suite = SuiteReport::new(vec![result("a", None).to_report()], Vec::new(), 1);
        let dir = tempfile::tempdir().unwrap();

        let yaml_path = dir.path().join("report.yaml");
        suite.save_to_file(&yaml_path).unwrap();
        let parsed: SuiteReport =
            serde_yaml::from_str(&std::fs::read_to_string(&yaml_path).unwrap()).unwrap();
        assert!(parsed.all_passed());

        let json_path = dir.path().join("report.json");
        suite.save_to_file(&json_path).unwrap();
        assert!(std::fs::read_to_string(&json_path).unwrap().contains("\"total\": 1"));
    }
}
