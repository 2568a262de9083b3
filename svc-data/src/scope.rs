use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::Postgres;
use svc_claims::AuthenticationClaims;

/// The tenant/partition predicate derived from the claim on the current
/// context. `None` when there is no claim, or the claim is an
/// internal-system claim — both bypass scoping entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantScope {
    pub tenant_id: String,
    pub partition_id: String,
}

impl TenantScope {
    pub fn from_claims(claims: Option<&AuthenticationClaims>) -> Option<Self> {
        let claims = claims?;
        if claims.is_internal_system() {
            return None;
        }
        Some(Self {
            tenant_id: claims.tenant_id(),
            partition_id: claims.partition_id(),
        })
    }

    fn predicate_sql(&self, first_param_index: usize) -> String {
        format!(
            "tenant_id = ${} AND partition_id = ${}",
            first_param_index,
            first_param_index + 1
        )
    }
}

/// A SQL statement decorated with the tenant/partition predicate when a
/// scope applies, carrying the bind values the predicate needs.
pub struct ScopedQuery {
    pub sql: String,
    scope: Option<TenantScope>,
}

impl ScopedQuery {
    /// `base_sql` must not already bind positional parameters beyond
    /// `existing_binds` — the scope predicate's parameters are appended
    /// after them.
    pub fn new(base_sql: &str, scope: Option<&TenantScope>, existing_binds: usize) -> Self {
        let sql = match scope {
            None => base_sql.to_string(),
            Some(scope) => {
                let predicate = scope.predicate_sql(existing_binds + 1);
                if contains_where(base_sql) {
                    format!("{base_sql} AND {predicate}")
                } else {
                    format!("{base_sql} WHERE {predicate}")
                }
            }
        };
        Self {
            sql,
            scope: scope.cloned(),
        }
    }

    /// Binds the scope's tenant/partition values, in order, after any
    /// binds the caller already applied for `base_sql`'s own parameters.
    pub fn bind_scope<'q>(
        &'q self,
        mut query: Query<'q, Postgres, PgArguments>,
    ) -> Query<'q, Postgres, PgArguments> {
        if let Some(scope) = &self.scope {
            query = query.bind(&scope.tenant_id).bind(&scope.partition_id);
        }
        query
    }

    pub fn is_scoped(&self) -> bool {
        self.scope.is_some()
    }
}

fn contains_where(sql: &str) -> bool {
    sql.to_ascii_uppercase().contains(" WHERE ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn internal_claims() -> AuthenticationClaims {
        AuthenticationClaims::new("svc").with_roles(["system_internal.relay"])
    }

    fn tenant_claims() -> AuthenticationClaims {
        AuthenticationClaims::new("user-1")
            .with_tenant("acme")
            .with_partition("eu")
            .with_roles(["member"])
    }

    #[test]
    fn no_claim_means_no_scope() {
        assert!(TenantScope::from_claims(None).is_none());
    }

    #[test]
    fn internal_system_claim_bypasses_scoping() {
        let claims = internal_claims();
        assert!(TenantScope::from_claims(Some(&claims)).is_none());
    }

    #[test]
    fn non_internal_claim_produces_scope_matching_its_tenant() {
        let claims = tenant_claims();
        let scope = TenantScope::from_claims(Some(&claims)).unwrap();
        assert_eq!(scope.tenant_id, "acme");
        assert_eq!(scope.partition_id, "eu");
    }

    #[test]
    fn scoped_query_appends_predicate_to_plain_statement() {
        let scope = TenantScope::from_claims(Some(&tenant_claims())).unwrap();
        let query = ScopedQuery::new("SELECT * FROM orders", Some(&scope), 0);
        assert_eq!(
            query.sql,
            "SELECT * FROM orders WHERE tenant_id = $1 AND partition_id = $2"
        );
    }

    #[test]
    fn scoped_query_extends_existing_where_clause() {
        let scope = TenantScope::from_claims(Some(&tenant_claims())).unwrap();
        let query = ScopedQuery::new("SELECT * FROM orders WHERE status = $1", Some(&scope), 1);
        assert_eq!(
            query.sql,
            "SELECT * FROM orders WHERE status = $1 AND tenant_id = $2 AND partition_id = $3"
        );
    }

    #[test]
    fn unscoped_query_is_left_untouched() {
        let query = ScopedQuery::new("SELECT * FROM orders", None, 0);
        assert_eq!(query.sql, "SELECT * FROM orders");
        assert!(!query.is_scoped());
    }
}
