//! Bulk load statement.

use super::{quote_literal, TargetTable};

/// Region and role used for every bulk load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyOptions {
    pub region: String,
    pub iam_role_arn: String,
}

/// `COPY` of one staged JSON-lines object into the target table.
///
/// `FORMAT AS JSON 'auto'` maps JSON keys onto column names: keys without a
/// column are dropped and columns without a key load as null.
pub fn copy_statement(target: &TargetTable, source_uri: &str, options: &CopyOptions) -> String {
    format!(
        "COPY {} FROM {} REGION {} IAM_ROLE {} FORMAT AS JSON 'auto'",
        target.qualified(),
        quote_literal(source_uri),
        quote_literal(&options.region),
        quote_literal(&options.iam_role_arn),
    )
}
