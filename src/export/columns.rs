//! Export layouts per record type.

use crate::domain::{
    AuditLog, Branch, Cluster, ClusterWeeklyReport, Family, LockedAccount, PasswordResetRequest,
    Person,
};

use super::{humanize, Exportable};

impl Exportable for Person {
    const TITLE: &'static str = "People";
    const FILE_STEM: &'static str = "people";
    const DEFAULT_COLUMNS: &'static [&'static str] = &[
        "member_id",
        "last_name",
        "first_name",
        "middle_name",
        "email",
        "phone",
        "role",
        "status",
        "date_first_attended",
    ];

    fn column_label(field: &str) -> String {
        match field {
            "member_id" => "Member ID".to_string(),
            "branch_id" => "Branch ID".to_string(),
            "date_of_birth" => "Birthday".to_string(),
            other => humanize(other),
        }
    }
}

impl Exportable for Family {
    const TITLE: &'static str = "Families";
    const FILE_STEM: &'static str = "families";
    const DEFAULT_COLUMNS: &'static [&'static str] = &["name", "address", "member_count"];
}

impl Exportable for Cluster {
    const TITLE: &'static str = "Clusters";
    const FILE_STEM: &'static str = "clusters";
    const DEFAULT_COLUMNS: &'static [&'static str] = &[
        "code",
        "name",
        "location",
        "meeting_schedule",
        "member_count",
        "family_count",
    ];
}

impl Exportable for ClusterWeeklyReport {
    const TITLE: &'static str = "Cluster Reports";
    const FILE_STEM: &'static str = "cluster_reports";
    const DEFAULT_COLUMNS: &'static [&'static str] = &[
        "year",
        "week_number",
        "meeting_date",
        "gathering_type",
        "member_attendance",
        "visitor_attendance",
        "total_attendance",
        "offering",
    ];

    fn column_label(field: &str) -> String {
        match field {
            "week_number" => "Week".to_string(),
            "cluster_id" => "Cluster ID".to_string(),
            other => humanize(other),
        }
    }
}

impl Exportable for Branch {
    const TITLE: &'static str = "Branches";
    const FILE_STEM: &'static str = "branches";
    const DEFAULT_COLUMNS: &'static [&'static str] =
        &["code", "name", "address", "is_active", "is_headquarters"];

    fn column_label(field: &str) -> String {
        match field {
            "is_active" => "Is Active".to_string(),
            "is_headquarters" => "Headquarters".to_string(),
            other => humanize(other),
        }
    }
}

impl Exportable for PasswordResetRequest {
    const TITLE: &'static str = "Password Reset Requests";
    const FILE_STEM: &'static str = "password_resets";
    const DEFAULT_COLUMNS: &'static [&'static str] =
        &["username", "reason", "status", "requested_at", "processed_at"];
}

impl Exportable for LockedAccount {
    const TITLE: &'static str = "Locked Accounts";
    const FILE_STEM: &'static str = "locked_accounts";
    const DEFAULT_COLUMNS: &'static [&'static str] =
        &["username", "failed_attempts", "locked_at", "locked_until", "is_locked"];
}

impl Exportable for AuditLog {
    const TITLE: &'static str = "Audit Log";
    const FILE_STEM: &'static str = "audit_log";
    const DEFAULT_COLUMNS: &'static [&'static str] =
        &["created_at", "actor_username", "action", "entity_type", "details"];
}
