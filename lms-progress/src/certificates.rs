//! Certificate Eligibility & Issuance
//!
//! At most one certificate exists per (learner, course). Two paths create
//! them:
//! - [`CertificateService::issue`]: the learning flow; returns the existing
//!   certificate when there is one.
//! - [`CertificateService::create_certificate`]: administrative; an existing
//!   certificate is a `Conflict`.
//!
//! Both serialize on the (learner, course) key inside this process, and the
//! store's unique index on (user_id, course_id) catches issuers in other
//! processes.

use crate::collaborators::{Catalog, EnrollmentStore, Identity};
use crate::keyed_lock::KeyedLocks;
use lms_common::db::{
    bounded, is_unique_violation, Certificate, CertificateUpdate, NewCertificate,
};
use lms_common::error::require_non_empty;
use lms_common::{time, uuid_utils, Error, Result};
use sqlx::{Pool, Sqlite};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Minimum cached course progress for a certificate
pub const ELIGIBILITY_THRESHOLD: u8 = 90;

/// Display name used when the learner's profile has none
pub const DEFAULT_DISPLAY_NAME: &str = "Student";

const CERTIFICATE_COLUMNS: &str = "id, user_id, course_id, user_name, course_name, \
                                   issue_date, expiry_date, certificate_url";

/// Eligibility checks and certificate persistence
#[derive(Clone)]
pub struct CertificateService {
    db: Pool<Sqlite>,
    timeout: Duration,
    enrollments: Arc<dyn EnrollmentStore>,
    catalog: Arc<dyn Catalog>,
    identity: Arc<dyn Identity>,
    locks: Arc<KeyedLocks>,
}

impl CertificateService {
    pub fn new(
        db: Pool<Sqlite>,
        timeout: Duration,
        enrollments: Arc<dyn EnrollmentStore>,
        catalog: Arc<dyn Catalog>,
        identity: Arc<dyn Identity>,
    ) -> Self {
        Self {
            db,
            timeout,
            enrollments,
            catalog,
            identity,
            locks: Arc::new(KeyedLocks::new()),
        }
    }

    /// True iff the learner is enrolled and cached progress is at least 90
    ///
    /// Fails closed: a missing enrollment or a failed read is `false`.
    pub async fn is_eligible(&self, learner_id: &str, course_id: &str) -> bool {
        match self.enrollments.get_progress(learner_id, course_id).await {
            Ok(Some(progress)) => progress >= ELIGIBILITY_THRESHOLD,
            Ok(None) => {
                debug!(learner_id, course_id, "Not enrolled; not eligible");
                false
            }
            Err(e) => {
                warn!(
                    learner_id,
                    course_id, "Enrollment read failed, treating as not eligible: {}", e
                );
                false
            }
        }
    }

    /// Issue the learner's certificate for a course, or return the existing one
    ///
    /// Eligibility is the caller's gate; this only guarantees uniqueness.
    pub async fn issue(&self, learner_id: &str, course_id: &str) -> Result<Certificate> {
        require_non_empty("learner_id", learner_id)?;
        require_non_empty("course_id", course_id)?;
        let learner_id = learner_id.trim();
        let course_id = course_id.trim();

        let _guard = self.locks.lock(&pair_key(learner_id, course_id)).await;

        if let Some(existing) = self.certificate_for(learner_id, course_id).await? {
            debug!(
                learner_id,
                course_id,
                certificate_id = %existing.id,
                "Certificate already issued"
            );
            return Ok(existing);
        }

        let course_title = self.catalog.course_title(course_id).await?;
        let display_name = self.identity.display_name(learner_id).await?;
        let display_name = match display_name.trim() {
            "" => DEFAULT_DISPLAY_NAME.to_string(),
            name => name.to_string(),
        };

        let certificate = Certificate {
            id: uuid_utils::generate_id(),
            learner_id: learner_id.to_string(),
            course_id: course_id.to_string(),
            learner_display_name: display_name,
            course_title,
            issue_date: time::now(),
            expiry_date: None,
            certificate_url: None,
        };

        match self.insert(&certificate).await {
            Ok(()) => {
                info!(
                    learner_id,
                    course_id,
                    certificate_id = %certificate.id,
                    "Certificate issued"
                );
                Ok(certificate)
            }
            Err(Error::Conflict(_)) => {
                // Another process issued between our check and insert
                self.certificate_for(learner_id, course_id)
                    .await?
                    .ok_or_else(|| {
                        Error::Internal(format!(
                            "certificate for {}/{} conflicted but cannot be read",
                            learner_id, course_id
                        ))
                    })
            }
            Err(e) => Err(e),
        }
    }

    /// Administrative creation; an existing certificate for the pair is a `Conflict`
    pub async fn create_certificate(&self, data: NewCertificate) -> Result<Certificate> {
        require_non_empty("learner_id", &data.learner_id)?;
        require_non_empty("course_id", &data.course_id)?;
        require_non_empty("learner_display_name", &data.learner_display_name)?;
        require_non_empty("course_title", &data.course_title)?;

        let learner_id = data.learner_id.trim().to_string();
        let course_id = data.course_id.trim().to_string();
        let _guard = self.locks.lock(&pair_key(&learner_id, &course_id)).await;

        if let Some(existing) = self.certificate_for(&learner_id, &course_id).await? {
            return Err(Error::Conflict(format!(
                "certificate {} already exists for learner {} and course {}",
                existing.id, learner_id, course_id
            )));
        }

        let certificate = Certificate {
            id: uuid_utils::generate_id(),
            learner_id,
            course_id,
            learner_display_name: data.learner_display_name.trim().to_string(),
            course_title: data.course_title.trim().to_string(),
            issue_date: data.issue_date.unwrap_or_else(time::now),
            expiry_date: None,
            certificate_url: None,
        };
        self.insert(&certificate).await?;

        info!(
            learner_id = %certificate.learner_id,
            course_id = %certificate.course_id,
            certificate_id = %certificate.id,
            "Certificate created"
        );
        Ok(certificate)
    }

    /// Change display metadata; the (learner, course) pair never changes
    pub async fn update_certificate(
        &self,
        certificate_id: &str,
        update: CertificateUpdate,
    ) -> Result<Certificate> {
        if let Some(name) = &update.learner_display_name {
            require_non_empty("learner_display_name", name)?;
        }
        if let Some(title) = &update.course_title {
            require_non_empty("course_title", title)?;
        }

        let mut certificate = self.get_certificate(certificate_id).await?;
        if update.is_empty() {
            return Ok(certificate);
        }
        update.apply_to(&mut certificate);

        let updated = bounded(self.timeout, "update certificate", async {
            let result = sqlx::query(
                "UPDATE certificates SET user_name = ?, course_name = ?, issue_date = ?, \
                 expiry_date = ?, certificate_url = ? WHERE id = ?",
            )
            .bind(&certificate.learner_display_name)
            .bind(&certificate.course_title)
            .bind(certificate.issue_date)
            .bind(certificate.expiry_date)
            .bind(&certificate.certificate_url)
            .bind(&certificate.id)
            .execute(&self.db)
            .await?;
            Ok::<_, Error>(result.rows_affected())
        })
        .await?;

        // Deleted after it was read
        if updated == 0 {
            return Err(Error::NotFound(format!("certificate {}", certificate.id)));
        }

        info!(certificate_id = %certificate.id, "Certificate updated");
        Ok(certificate)
    }

    /// Delete a certificate; `NotFound` if it does not exist
    pub async fn delete_certificate(&self, certificate_id: &str) -> Result<()> {
        let certificate = self.get_certificate(certificate_id).await?;

        bounded(self.timeout, "delete certificate", async {
            sqlx::query("DELETE FROM certificates WHERE id = ?")
                .bind(&certificate.id)
                .execute(&self.db)
                .await?;
            Ok::<_, Error>(())
        })
        .await?;

        info!(
            certificate_id = %certificate.id,
            learner_id = %certificate.learner_id,
            course_id = %certificate.course_id,
            "Certificate deleted"
        );
        Ok(())
    }

    /// Certificate by id; `NotFound` if absent
    pub async fn get_certificate(&self, certificate_id: &str) -> Result<Certificate> {
        require_non_empty("certificate_id", certificate_id)?;

        let sql = format!("SELECT {} FROM certificates WHERE id = ?", CERTIFICATE_COLUMNS);
        let row = bounded(self.timeout, "get certificate", async {
            Ok::<_, Error>(
                sqlx::query(&sql)
                    .bind(certificate_id)
                    .fetch_optional(&self.db)
                    .await?,
            )
        })
        .await?
        .ok_or_else(|| Error::NotFound(format!("certificate {}", certificate_id)))?;

        Ok(Certificate::from_row(&row)?)
    }

    /// Certificate for a (learner, course) pair, if issued
    pub async fn certificate_for(
        &self,
        learner_id: &str,
        course_id: &str,
    ) -> Result<Option<Certificate>> {
        let sql = format!(
            "SELECT {} FROM certificates WHERE user_id = ? AND course_id = ? \
             ORDER BY issue_date LIMIT 1",
            CERTIFICATE_COLUMNS
        );
        bounded(self.timeout, "find certificate", async {
            let row = sqlx::query(&sql)
                .bind(learner_id)
                .bind(course_id)
                .fetch_optional(&self.db)
                .await?;
            Ok::<_, Error>(row.map(|r| Certificate::from_row(&r)).transpose()?)
        })
        .await
    }

    /// All certificates, or one learner's, newest first
    pub async fn list_certificates(&self, learner_id: Option<&str>) -> Result<Vec<Certificate>> {
        bounded(self.timeout, "list certificates", async {
            let rows = match learner_id {
                Some(learner_id) => {
                    let sql = format!(
                        "SELECT {} FROM certificates WHERE user_id = ? \
                         ORDER BY issue_date DESC, id",
                        CERTIFICATE_COLUMNS
                    );
                    sqlx::query(&sql)
                        .bind(learner_id)
                        .fetch_all(&self.db)
                        .await?
                }
                None => {
                    let sql = format!(
                        "SELECT {} FROM certificates ORDER BY issue_date DESC, id",
                        CERTIFICATE_COLUMNS
                    );
                    sqlx::query(&sql).fetch_all(&self.db).await?
                }
            };

            Ok::<_, Error>(
                rows.iter()
                    .map(Certificate::from_row)
                    .collect::<sqlx::Result<Vec<_>>>()?,
            )
        })
        .await
    }

    /// Insert a new certificate row; a unique-index hit is a `Conflict`
    async fn insert(&self, certificate: &Certificate) -> Result<()> {
        bounded(self.timeout, "insert certificate", async {
            let result = sqlx::query(
                "INSERT INTO certificates (id, user_id, course_id, user_name, course_name, \
                 issue_date, expiry_date, certificate_url) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&certificate.id)
            .bind(&certificate.learner_id)
            .bind(&certificate.course_id)
            .bind(&certificate.learner_display_name)
            .bind(&certificate.course_title)
            .bind(certificate.issue_date)
            .bind(certificate.expiry_date)
            .bind(&certificate.certificate_url)
            .execute(&self.db)
            .await;

            match result {
                Ok(_) => Ok(()),
                Err(e) if is_unique_violation(&e) => Err(Error::Conflict(format!(
                    "certificate already exists for learner {} and course {}",
                    certificate.learner_id, certificate.course_id
                ))),
                Err(e) => Err(e.into()),
            }
        })
        .await
    }
}

fn pair_key(learner_id: &str, course_id: &str) -> String {
    format!("{}\u{1f}{}", learner_id, course_id)
}
