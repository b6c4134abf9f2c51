/// Named analytical reports over the relational schema
///
/// Each report is a plain [`Statement`] run through
/// [`RelationalSession::read`](crate::db::session::RelationalSession), so the
/// result is a list of ordered records ready to be exported.
///
/// # Example
///
/// ```no_run
/// use taskledger_shared::db::session::RelationalSession;
/// use taskledger_shared::reports::{standard_reports, ReportParams};
///
/// # async fn example(session: &mut RelationalSession) -> Result<(), taskledger_shared::error::DataError> {
/// for report in standard_reports(&ReportParams::default()) {
///     let rows = session.read(&report.statement).await?;
///     println!("{}: {} rows", report.name, rows.len());
/// }
/// # Ok(())
/// # }
/// ```
use crate::db::statement::Statement;
use crate::models::status::{STATUS_COMPLETED, STATUS_IN_PROGRESS, STATUS_NEW};

/// A report name plus the statement producing it
#[derive(Debug, Clone, PartialEq)]
pub struct NamedReport {
    /// Stable identifier, also used as the export file stem
    pub name: &'static str,
    pub statement: Statement,
}

/// Inputs for the parameterized reports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportParams {
    /// User whose tasks `user_tasks` lists
    pub user_id: i32,

    /// Status listed by `tasks_by_status`
    pub status: String,

    /// Status listed by `in_progress_status_tasks`
    pub active_status: String,

    /// Status excluded by `uncompleted_tasks`
    pub completed_status: String,

    /// Domain for `users_by_email`, without the `@`
    pub user_email_domain: String,

    /// Domain for `tasks_by_user_email_domain`, without the `@`
    pub task_email_domain: String,
}

impl Default for ReportParams {
    fn default() -> Self {
        Self {
            user_id: 1,
            status: STATUS_NEW.to_string(),
            active_status: STATUS_IN_PROGRESS.to_string(),
            completed_status: STATUS_COMPLETED.to_string(),
            user_email_domain: "example.org".to_string(),
            task_email_domain: "example.com".to_string(),
        }
    }
}

/// Tasks of one user with their status names
pub fn user_tasks(user_id: i32) -> Statement {
    Statement::new(
        r#"
        SELECT u.fullname, t.id, t.title, t.description, s.name AS status
        FROM tasks t
        JOIN status s ON t.status_id = s.id
        JOIN users u ON t.user_id = u.id
        WHERE t.user_id = $1
        ORDER BY t.id
        "#,
    )
    .bind(user_id)
}

/// Tasks currently in the named status
pub fn tasks_by_status(status: &str) -> Statement {
    Statement::new(
        r#"
        SELECT s.name AS status, t.title, t.description, u.fullname
        FROM tasks t
        JOIN users u ON t.user_id = u.id
        JOIN status s ON t.status_id = s.id
        WHERE s.name = $1
        ORDER BY t.id
        "#,
    )
    .bind(status)
}

/// Users that own no tasks
pub fn users_without_tasks() -> Statement {
    Statement::new(
        r#"
        SELECT u.id, u.fullname, u.email
        FROM users u
        WHERE NOT EXISTS (SELECT 1 FROM tasks t WHERE t.user_id = u.id)
        ORDER BY u.id
        "#,
    )
}

/// Tasks not in the completed status
pub fn uncompleted_tasks(completed_status: &str) -> Statement {
    Statement::new(
        r#"
        SELECT t.id, t.title, t.description, s.name AS status, u.fullname
        FROM tasks t
        JOIN status s ON t.status_id = s.id
        JOIN users u ON t.user_id = u.id
        WHERE s.name <> $1
        ORDER BY t.id
        "#,
    )
    .bind(completed_status)
}

/// Users whose email ends in `@domain`
pub fn users_by_email_domain(domain: &str) -> Statement {
    Statement::new(
        r#"
        SELECT id, fullname, email
        FROM users
        WHERE email LIKE ('%@' || $1)
        ORDER BY id
        "#,
    )
    .bind(domain)
}

/// Number of tasks per status, including statuses with none
pub fn task_statistics() -> Statement {
    Statement::new(
        r#"
        SELECT s.name, COUNT(t.id) AS tasks_count
        FROM status s
        LEFT JOIN tasks t ON s.id = t.status_id
        GROUP BY s.name
        ORDER BY tasks_count DESC, s.name
        "#,
    )
}

/// Tasks owned by users whose email ends in `@domain`
pub fn tasks_by_user_email_domain(domain: &str) -> Statement {
    Statement::new(
        r#"
        SELECT t.id, t.title, t.description, u.fullname, u.email
        FROM tasks t
        JOIN users u ON t.user_id = u.id
        WHERE u.email LIKE ('%@' || $1)
        ORDER BY t.id
        "#,
    )
    .bind(domain)
}

/// Tasks with a missing or blank description
pub fn tasks_without_description() -> Statement {
    Statement::new(
        r#"
        SELECT t.id, t.title, t.description, u.fullname
        FROM tasks t
        JOIN users u ON t.user_id = u.id
        WHERE t.description IS NULL OR trim(t.description) = ''
        ORDER BY t.id
        "#,
    )
}

/// Users with their tasks in the named status
pub fn tasks_in_status(status: &str) -> Statement {
    Statement::new(
        r#"
        SELECT u.fullname, t.title, t.description
        FROM users u
        JOIN tasks t ON u.id = t.user_id
        JOIN status s ON t.status_id = s.id
        WHERE s.name = $1
        ORDER BY t.id
        "#,
    )
    .bind(status)
}

/// Every user with the number of tasks they own
pub fn users_and_tasks_statistics() -> Statement {
    Statement::new(
        r#"
        SELECT u.id, u.fullname, u.email, COUNT(t.id) AS tasks_count
        FROM users u
        LEFT JOIN tasks t ON u.id = t.user_id
        GROUP BY u.id, u.fullname, u.email
        ORDER BY tasks_count DESC, u.id
        "#,
    )
}

/// The full catalog, in export order
pub fn standard_reports(params: &ReportParams) -> Vec<NamedReport> {
    vec![
        NamedReport {
            name: "user_tasks",
            statement: user_tasks(params.user_id),
        },
        NamedReport {
            name: "tasks_by_status",
            statement: tasks_by_status(&params.status),
        },
        NamedReport {
            name: "users_without_tasks",
            statement: users_without_tasks(),
        },
        NamedReport {
            name: "uncompleted_tasks",
            statement: uncompleted_tasks(&params.completed_status),
        },
        NamedReport {
            name: "users_by_email",
            statement: users_by_email_domain(&params.user_email_domain),
        },
        NamedReport {
            name: "task_statistics",
            statement: task_statistics(),
        },
        NamedReport {
            name: "tasks_by_user_email_domain",
            statement: tasks_by_user_email_domain(&params.task_email_domain),
        },
        NamedReport {
            name: "tasks_without_description",
            statement: tasks_without_description(),
        },
        NamedReport {
            name: "in_progress_status_tasks",
            statement: tasks_in_status(&params.active_status),
        },
        NamedReport {
            name: "users_and_tasks_statistics",
            statement: users_and_tasks_statistics(),
        },
    ]
}

/// Looks up one report of the catalog by name
pub fn find_report(params: &ReportParams, name: &str) -> Option<NamedReport> {
    standard_reports(params).into_iter().find(|r| r.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::statement::SqlParam;
    use std::collections::HashSet;

    #[test]
    fn test_catalog_names_are_unique() {
        let reports = standard_reports(&ReportParams::default());
        assert_eq!(reports.len(), 10);

        let names: HashSet<&str> = reports.iter().map(|r| r.name).collect();
        assert_eq!(names.len(), reports.len());
    }

    #[test]
    fn test_params_flow_into_statements() {
        let params = ReportParams {
            user_id: 50,
            user_email_domain: "corp.test".to_string(),
            ..Default::default()
        };

        let user_tasks = find_report(&params, "user_tasks").expect("report exists");
        assert_eq!(user_tasks.statement.params(), &[SqlParam::Int(50)]);

        let by_email = find_report(&params, "users_by_email").expect("report exists");
        assert_eq!(by_email.statement.params(), &[SqlParam::Text("corp.test".to_string())]);

        let uncompleted = find_report(&params, "uncompleted_tasks").expect("report exists");
        assert_eq!(uncompleted.statement.params(), &[SqlParam::Text("Completed".to_string())]);
    }

    #[test]
    fn test_unknown_report() {
        assert!(find_report(&ReportParams::default(), "nope").is_none());
    }
}
