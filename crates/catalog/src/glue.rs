//! AWS Glue Data Catalog implementation of [`CatalogStore`].

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_glue::config::Region;
use aws_sdk_glue::error::DisplayErrorContext;
use aws_sdk_glue::types as glue;
use aws_sdk_glue::Client;
use tracing::{debug, info};

use tablesync_core::config::AwsConfig;

use crate::error::CatalogError;
use crate::store::CatalogStore;
use crate::table::{
    CatalogColumn, SchemaId, SchemaReference, SerdeInfo, SkewedInfo, SortColumn, StorageDescriptor,
    TableDefinition,
};

/// Glue-backed catalog store.
pub struct GlueCatalog {
    client: Client,
}

impl GlueCatalog {
    /// Build a Glue client from project config.
    ///
    /// Static credentials and the endpoint override are applied on top of the
    /// SDK's default chain, so instance roles keep working when neither is set.
    pub async fn new(aws: &AwsConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(aws.region.clone()));

        if let (Some(key_id), Some(secret)) = (&aws.access_key_id, &aws.secret_access_key) {
            let creds = Credentials::new(
                key_id,
                secret,
                aws.session_token.clone(),
                None,
                "tablesync-static",
            );
            loader = loader.credentials_provider(creds);
        }

        if let Some(endpoint) = aws.endpoint_with_scheme() {
            loader = loader.endpoint_url(endpoint);
        }

        let sdk_config = loader.load().await;

        info!(region = %aws.region, "Glue catalog client initialised");

        Self {
            client: Client::new(&sdk_config),
        }
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CatalogStore for GlueCatalog {
    fn kind(&self) -> &'static str {
        "glue"
    }

    async fn get_table(
        &self,
        database: &str,
        table: &str,
    ) -> Result<TableDefinition, CatalogError> {
        debug!(database, table, "GetTable");

        let resp = self
            .client
            .get_table()
            .database_name(database)
            .name(table)
            .send()
            .await
            .map_err(|e| {
                let missing = e
                    .as_service_error()
                    .map(|se| se.is_entity_not_found_exception())
                    .unwrap_or(false);
                if missing {
                    CatalogError::not_found(database, table)
                } else {
                    CatalogError::Service(format!("GetTable failed: {}", DisplayErrorContext(&e)))
                }
            })?;

        let found = resp
            .table()
            .ok_or_else(|| CatalogError::not_found(database, table))?;
        Ok(table_from_glue(found))
    }

    async fn update_table(
        &self,
        database: &str,
        table: &TableDefinition,
        expected_version: Option<&str>,
    ) -> Result<(), CatalogError> {
        debug!(database, table = %table.name, ?expected_version, "UpdateTable");

        let input = table_input_to_glue(table)?;

        self.client
            .update_table()
            .database_name(database)
            .table_input(input)
            .set_version_id(expected_version.map(str::to_string))
            .send()
            .await
            .map_err(|e| match e.as_service_error() {
                Some(se) if se.is_entity_not_found_exception() => {
                    CatalogError::not_found(database, &table.name)
                }
                Some(se) if se.is_concurrent_modification_exception() => CatalogError::conflict(
                    database,
                    &table.name,
                    DisplayErrorContext(&e).to_string(),
                ),
                _ => CatalogError::Service(format!("UpdateTable failed: {}", DisplayErrorContext(&e))),
            })?;

        Ok(())
    }
}

// ── Glue <-> model conversion ───────────────────────────────────

fn params_from_glue(map: Option<&HashMap<String, String>>) -> BTreeMap<String, String> {
    map.map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default()
}

fn params_to_glue(map: &BTreeMap<String, String>) -> Option<HashMap<String, String>> {
    (!map.is_empty()).then(|| map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
}

fn column_from_glue(c: &glue::Column) -> CatalogColumn {
    CatalogColumn {
        name: c.name().to_string(),
        data_type: c.r#type().map(str::to_string),
        comment: c.comment().map(str::to_string),
        parameters: params_from_glue(c.parameters()),
    }
}

fn skewed_from_glue(s: &glue::SkewedInfo) -> SkewedInfo {
    SkewedInfo {
        skewed_column_names: s.skewed_column_names().to_vec(),
        skewed_column_values: s.skewed_column_values().to_vec(),
        skewed_column_value_location_maps: params_from_glue(s.skewed_column_value_location_maps()),
    }
}

fn schema_reference_from_glue(r: &glue::SchemaReference) -> SchemaReference {
    SchemaReference {
        schema_id: r.schema_id().map(|id| SchemaId {
            schema_arn: id.schema_arn().map(str::to_string),
            schema_name: id.schema_name().map(str::to_string),
            registry_name: id.registry_name().map(str::to_string),
        }),
        schema_version_id: r.schema_version_id().map(str::to_string),
        schema_version_number: r.schema_version_number(),
    }
}

fn descriptor_from_glue(sd: &glue::StorageDescriptor) -> StorageDescriptor {
    StorageDescriptor {
        columns: sd.columns().iter().map(column_from_glue).collect(),
        location: sd.location().map(str::to_string),
        additional_locations: sd.additional_locations().to_vec(),
        input_format: sd.input_format().map(str::to_string),
        output_format: sd.output_format().map(str::to_string),
        compressed: sd.compressed(),
        number_of_buckets: sd.number_of_buckets(),
        serde_info: sd.serde_info().map(|s| SerdeInfo {
            name: s.name().map(str::to_string),
            serialization_library: s.serialization_library().map(str::to_string),
            parameters: params_from_glue(s.parameters()),
        }),
        bucket_columns: sd.bucket_columns().to_vec(),
        sort_columns: sd
            .sort_columns()
            .iter()
            .map(|o| SortColumn {
                column: o.column().to_string(),
                sort_order: o.sort_order(),
            })
            .collect(),
        parameters: params_from_glue(sd.parameters()),
        skewed_info: sd.skewed_info().map(skewed_from_glue),
        stored_as_sub_directories: sd.stored_as_sub_directories(),
        schema_reference: sd.schema_reference().map(schema_reference_from_glue),
    }
}

/// Convert a Glue `Table` into the catalog model.
pub fn table_from_glue(t: &glue::Table) -> TableDefinition {
    TableDefinition {
        name: t.name().to_string(),
        table_type: t.table_type().map(str::to_string),
        description: t.description().map(str::to_string),
        owner: t.owner().map(str::to_string),
        retention: t.retention(),
        storage_descriptor: t
            .storage_descriptor()
            .map(descriptor_from_glue)
            .unwrap_or_default(),
        partition_keys: t.partition_keys().iter().map(column_from_glue).collect(),
        parameters: params_from_glue(t.parameters()),
        version_id: t.version_id().map(str::to_string),
    }
}

fn column_to_glue(c: &CatalogColumn) -> Result<glue::Column, CatalogError> {
    glue::Column::builder()
        .name(&c.name)
        .set_type(c.data_type.clone())
        .set_comment(c.comment.clone())
        .set_parameters(params_to_glue(&c.parameters))
        .build()
        .map_err(|e| CatalogError::InvalidDefinition(format!("column {}: {}", c.name, e)))
}

fn skewed_to_glue(s: &SkewedInfo) -> glue::SkewedInfo {
    glue::SkewedInfo::builder()
        .set_skewed_column_names(
            (!s.skewed_column_names.is_empty()).then(|| s.skewed_column_names.clone()),
        )
        .set_skewed_column_values(
            (!s.skewed_column_values.is_empty()).then(|| s.skewed_column_values.clone()),
        )
        .set_skewed_column_value_location_maps(params_to_glue(&s.skewed_column_value_location_maps))
        .build()
}

fn schema_reference_to_glue(r: &SchemaReference) -> glue::SchemaReference {
    glue::SchemaReference::builder()
        .set_schema_id(r.schema_id.as_ref().map(|id| {
            glue::SchemaId::builder()
                .set_schema_arn(id.schema_arn.clone())
                .set_schema_name(id.schema_name.clone())
                .set_registry_name(id.registry_name.clone())
                .build()
        }))
        .set_schema_version_id(r.schema_version_id.clone())
        .set_schema_version_number(r.schema_version_number)
        .build()
}

fn descriptor_to_glue(sd: &StorageDescriptor) -> Result<glue::StorageDescriptor, CatalogError> {
    let columns = sd
        .columns
        .iter()
        .map(column_to_glue)
        .collect::<Result<Vec<_>, _>>()?;

    let sort_columns = sd
        .sort_columns
        .iter()
        .map(|s| {
            glue::Order::builder()
                .column(&s.column)
                .sort_order(s.sort_order)
                .build()
                .map_err(|e| CatalogError::InvalidDefinition(format!("sort column {}: {}", s.column, e)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let serde_info = sd.serde_info.as_ref().map(|s| {
        glue::SerDeInfo::builder()
            .set_name(s.name.clone())
            .set_serialization_library(s.serialization_library.clone())
            .set_parameters(params_to_glue(&s.parameters))
            .build()
    });

    Ok(glue::StorageDescriptor::builder()
        .set_columns(Some(columns))
        .set_location(sd.location.clone())
        .set_additional_locations(
            (!sd.additional_locations.is_empty()).then(|| sd.additional_locations.clone()),
        )
        .set_input_format(sd.input_format.clone())
        .set_output_format(sd.output_format.clone())
        // The SDK omits false and 0 on the wire, so unset values stay unset.
        .compressed(sd.compressed)
        .number_of_buckets(sd.number_of_buckets)
        .set_serde_info(serde_info)
        .set_bucket_columns((!sd.bucket_columns.is_empty()).then(|| sd.bucket_columns.clone()))
        .set_sort_columns((!sort_columns.is_empty()).then_some(sort_columns))
        .set_parameters(params_to_glue(&sd.parameters))
        .set_skewed_info(sd.skewed_info.as_ref().map(skewed_to_glue))
        .stored_as_sub_directories(sd.stored_as_sub_directories)
        .set_schema_reference(sd.schema_reference.as_ref().map(schema_reference_to_glue))
        .build())
}

/// Convert the catalog model into a Glue `TableInput` for `UpdateTable`.
pub fn table_input_to_glue(t: &TableDefinition) -> Result<glue::TableInput, CatalogError> {
    let partition_keys = t
        .partition_keys
        .iter()
        .map(column_to_glue)
        .collect::<Result<Vec<_>, _>>()?;

    glue::TableInput::builder()
        .name(&t.name)
        .set_description(t.description.clone())
        .set_owner(t.owner.clone())
        .retention(t.retention)
        .storage_descriptor(descriptor_to_glue(&t.storage_descriptor)?)
        .set_partition_keys((!partition_keys.is_empty()).then_some(partition_keys))
        .set_table_type(t.table_type.clone())
        .set_parameters(params_to_glue(&t.parameters))
        .build()
        .map_err(|e| CatalogError::InvalidDefinition(format!("table {}: {}", t.name, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::update::{merge_table, string_columns};

    fn glue_table() -> glue::Table {
        let serde = glue::SerDeInfo::builder()
            .name("parquet-serde")
            .serialization_library("org.apache.hadoop.hive.ql.io.parquet.serde.ParquetHiveSerDe")
            .parameters("serialization.format", "1")
            .build();

        let sd = glue::StorageDescriptor::builder()
            .columns(
                glue::Column::builder()
                    .name("alien_id")
                    .r#type("int")
                    .build()
                    .unwrap(),
            )
            .location("s3://old-location/")
            .input_format("org.apache.hadoop.hive.ql.io.parquet.MapredParquetInputFormat")
            .output_format("org.apache.hadoop.hive.ql.io.parquet.MapredParquetOutputFormat")
            .compressed(true)
            .number_of_buckets(-1)
            .serde_info(serde)
            .parameters("classification", "parquet")
            .build();

        glue::Table::builder()
            .name("ben10")
            .database_name("jaladatax")
            .table_type("EXTERNAL_TABLE")
            .storage_descriptor(sd)
            .partition_keys(glue::Column::builder().name("dt").r#type("string").build().unwrap())
            .parameters("EXTERNAL", "TRUE")
            .version_id("7")
            .build()
            .unwrap()
    }

    #[test]
    fn reads_glue_table() {
        let def = table_from_glue(&glue_table());
        assert_eq!(def.name, "ben10");
        assert!(def.is_external());
        assert_eq!(def.version_id.as_deref(), Some("7"));
        assert_eq!(def.storage_descriptor.columns[0].data_type.as_deref(), Some("int"));
        assert_eq!(def.storage_descriptor.number_of_buckets, -1);
        assert!(def.storage_descriptor.compressed);
        let serde = def.storage_descriptor.serde_info.as_ref().unwrap();
        assert_eq!(serde.name.as_deref(), Some("parquet-serde"));
        assert_eq!(serde.parameters.get("serialization.format").map(String::as_str), Some("1"));
        assert_eq!(def.partition_keys[0].name, "dt");
    }

    #[test]
    fn update_input_keeps_serde_and_partitions() {
        let existing = table_from_glue(&glue_table());
        let merged = merge_table(&existing, string_columns(["alien_id", "species"]), "s3://new/");
        let input = table_input_to_glue(&merged).unwrap();

        assert_eq!(input.name(), "ben10");
        assert_eq!(input.table_type(), Some("EXTERNAL_TABLE"));
        assert_eq!(input.partition_keys().len(), 1);

        let sd = input.storage_descriptor().unwrap();
        assert_eq!(sd.location(), Some("s3://new/"));
        let names: Vec<&str> = sd.columns().iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["alien_id", "species"]);
        assert!(sd.columns().iter().all(|c| c.r#type() == Some("string")));

        let serde = sd.serde_info().unwrap();
        assert_eq!(
            serde.serialization_library(),
            Some("org.apache.hadoop.hive.ql.io.parquet.serde.ParquetHiveSerDe")
        );
        assert_eq!(sd.output_format(), existing.storage_descriptor.output_format.as_deref());
        assert_eq!(sd.number_of_buckets(), -1);
    }

    #[test]
    fn update_input_keeps_skew_and_schema_reference() {
        let skew = glue::SkewedInfo::builder()
            .skewed_column_names("species")
            .skewed_column_values("Piscciss")
            .skewed_column_value_location_maps("Piscciss", "s3://old-location/species=Piscciss/")
            .build();
        let schema_ref = glue::SchemaReference::builder()
            .schema_id(
                glue::SchemaId::builder()
                    .registry_name("aliens-registry")
                    .schema_name("ben10")
                    .build(),
            )
            .schema_version_number(3)
            .build();
        let sd = glue::StorageDescriptor::builder()
            .columns(glue::Column::builder().name("alien_id").build().unwrap())
            .location("s3://old-location/")
            .skewed_info(skew.clone())
            .schema_reference(schema_ref.clone())
            .build();
        let table = glue::Table::builder()
            .name("ben10")
            .storage_descriptor(sd)
            .build()
            .unwrap();

        let existing = table_from_glue(&table);
        let merged = merge_table(&existing, string_columns(["alien_id"]), "s3://new/");
        let input = table_input_to_glue(&merged).unwrap();
        let sd = input.storage_descriptor().unwrap();

        assert_eq!(sd.location(), Some("s3://new/"));
        assert_eq!(sd.skewed_info(), Some(&skew));
        assert_eq!(sd.schema_reference(), Some(&schema_ref));
    }

    #[test]
    fn unset_descriptor_flags_stay_default() {
        let sd = glue::StorageDescriptor::builder()
            .location("s3://old-location/")
            .build();
        let table = glue::Table::builder()
            .name("ben10")
            .storage_descriptor(sd)
            .build()
            .unwrap();

        let merged = merge_table(&table_from_glue(&table), string_columns(["alien_id"]), "s3://new/");
        let input = table_input_to_glue(&merged).unwrap();
        let sd = input.storage_descriptor().unwrap();

        assert!(!sd.compressed());
        assert_eq!(sd.number_of_buckets(), 0);
        assert!(!sd.stored_as_sub_directories());
        assert!(sd.skewed_info().is_none());
        assert!(sd.schema_reference().is_none());
    }
}
