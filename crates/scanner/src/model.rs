//! 스캔 백엔드 프로젝트 상태 모델
//!
//! 백엔드가 보고하는 구조는 `Project → Version → CodeLocation → ScanSummary`로
//! 중첩됩니다. 필드 이름은 백엔드 형식(PascalCase)을 그대로 따르며,
//! 빠진 필드는 빈 값으로 해석합니다.
//!
//! # 완료 판정
//!
//! [`is_project_done`]은 다음을 모두 만족할 때만 참입니다.
//!
//! 1. 버전이 하나 이상 있음
//! 2. 첫 번째 버전에 코드 로케이션이 하나 이상 있음
//! 3. 모든 코드 로케이션에 스캔 요약이 하나 이상 있음
//! 4. 모든 스캔 요약의 상태가 정확히 `COMPLETE`

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use perceptor_core::types::{ScanCounts, Severity, Vulnerability};

use crate::error::ScanResultsError;

/// 취약점 위험도 카테고리 키
pub const VULNERABILITY_CATEGORY: &str = "VULNERABILITY";
/// 집계 대상 위험 등급
pub const HIGH_RISK: &str = "HIGH";
/// 정책 위반 상태 키
pub const IN_VIOLATION: &str = "IN_VIOLATION";

/// 백엔드 프로젝트
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Project {
    pub name: String,
    pub source: String,
    pub versions: Vec<Version>,
}

/// 프로젝트 버전
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Version {
    pub version_name: String,
    pub code_locations: Vec<CodeLocation>,
    pub risk_profile: RiskProfile,
    pub policy_status: PolicyStatus,
    pub vulnerabilities: Vec<ReportedVulnerability>,
}

/// 스캔이 수행된 위치
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CodeLocation {
    pub name: String,
    pub url: String,
    pub scan_summaries: Vec<ScanSummary>,
}

/// 개별 스캔의 진행 상태
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ScanSummary {
    /// 상태 문자열 (대소문자 구분)
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl ScanSummary {
    pub fn status_kind(&self) -> ScanSummaryStatus {
        ScanSummaryStatus::parse(&self.status)
    }
}

/// 카테고리별 위험 등급 집계 (`Categories["VULNERABILITY"]["HIGH"]`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RiskProfile {
    pub categories: BTreeMap<String, BTreeMap<String, i64>>,
}

/// 컴포넌트 버전 정책 상태 집계
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PolicyStatus {
    pub overall_status: String,
    pub component_version_status_counts: BTreeMap<String, i64>,
}

/// 버전에 보고된 개별 취약점
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ReportedVulnerability {
    pub name: String,
    pub severity: String,
}

/// 스캔 요약 상태
///
/// 알 수 없는 상태 문자열은 진행 중으로 취급합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanSummaryStatus {
    Success,
    InProgress,
    Failure,
}

impl ScanSummaryStatus {
    /// 백엔드 상태 문자열을 해석합니다 (대소문자 구분).
    pub fn parse(status: &str) -> Self {
        match status {
            "COMPLETE" => Self::Success,
            "ERROR" | "ERROR_BUILDING_BOM" | "ERROR_MATCHING" | "ERROR_SAVING_SCAN_DATA"
            | "ERROR_SCANNING" | "CANCELLED" => Self::Failure,
            _ => Self::InProgress,
        }
    }
}

impl fmt::Display for ScanSummaryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("success"),
            Self::InProgress => f.write_str("in_progress"),
            Self::Failure => f.write_str("failure"),
        }
    }
}

/// 이미지 하나에 대한 스캔 결과
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanResults {
    pub counts: ScanCounts,
    pub vulnerabilities: Vec<Vulnerability>,
}

/// 프로젝트 스캔이 끝났는지 판정합니다.
pub fn is_project_done(project: &Project) -> bool {
    let Some(version) = project.versions.first() else {
        return false;
    };
    if version.code_locations.is_empty() {
        return false;
    }
    version.code_locations.iter().all(|location| {
        !location.scan_summaries.is_empty()
            && location
                .scan_summaries
                .iter()
                .all(|summary| summary.status_kind() == ScanSummaryStatus::Success)
    })
}

impl Project {
    /// 첫 번째 버전에서 스캔 결과를 집계합니다.
    ///
    /// # Errors
    ///
    /// - 버전이 없으면 `ScanResultsError::NoVersions`
    /// - 음수 집계값이면 `ScanResultsError::NegativeCount`
    pub fn scan_results(&self) -> Result<ScanResults, ScanResultsError> {
        let version = self
            .versions
            .first()
            .ok_or_else(|| ScanResultsError::NoVersions {
                project: self.name.clone(),
            })?;

        let vulnerability_count = version
            .risk_profile
            .categories
            .get(VULNERABILITY_CATEGORY)
            .and_then(|levels| levels.get(HIGH_RISK))
            .copied()
            .unwrap_or(0);
        let policy_violation_count = version
            .policy_status
            .component_version_status_counts
            .get(IN_VIOLATION)
            .copied()
            .unwrap_or(0);

        let counts = ScanCounts {
            policy_violation_count: self.non_negative("PolicyViolationCount", policy_violation_count)?,
            vulnerability_count: self.non_negative("VulnerabilityCount", vulnerability_count)?,
        };
        let vulnerabilities = version
            .vulnerabilities
            .iter()
            .map(|v| Vulnerability {
                name: v.name.clone(),
                severity: Severity::from_str_loose(&v.severity),
            })
            .collect();

        Ok(ScanResults {
            counts,
            vulnerabilities,
        })
    }

    fn non_negative(&self, field: &'static str, value: i64) -> Result<u32, ScanResultsError> {
        u32::try_from(value).map_err(|_| ScanResultsError::NegativeCount {
            project: self.name.clone(),
            field,
            value,
        })
    }
}
