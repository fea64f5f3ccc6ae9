use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{json, Value};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::SourceError;
use crate::models::ProspectUpdate;
use crate::normalize;
use crate::source::{self, PayloadKind, ReportFilters};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

fn at(date: NaiveDate, hour: u32) -> anyhow::Result<NaiveDateTime> {
    date.and_hms_opt(hour, 0, 0).context("invalid seed time")
}

fn day(year: i32, month: u32, day: u32) -> anyhow::Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day).context("invalid seed date")
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let prospects = vec![
        (
            Uuid::parse_str("6b1f3c1e-8d2a-4c55-9a61-0f3b7e2d9a10")?,
            "Valentina Ríos",
            "valentina.rios@example.edu",
            "Bogotá",
            "Facebook",
            "Matriculado",
            day(2025, 4, 3)?,
        ),
        (
            Uuid::parse_str("a4e2d7b9-1c3f-4e8a-b5d6-7f9e0a1b2c34")?,
            "Santiago Gómez",
            "santiago.gomez@example.edu",
            "Medellín",
            "Web",
            "Contactado",
            day(2025, 4, 18)?,
        ),
        (
            Uuid::parse_str("c7d8e9f0-2a3b-4c5d-8e6f-9a0b1c2d3e45")?,
            "Camila Torres",
            "camila.torres@example.edu",
            "Cali",
            "Referido",
            "En proceso",
            day(2025, 5, 2)?,
        ),
        (
            Uuid::parse_str("0e1f2a3b-4c5d-4e6f-8a7b-9c0d1e2f3a56")?,
            "Mateo Herrera",
            "mateo.herrera@example.edu",
            "Bogotá",
            "Web",
            "Nuevo",
            day(2025, 5, 20)?,
        ),
        (
            Uuid::parse_str("5a6b7c8d-9e0f-4a1b-8c2d-3e4f5a6b7c67")?,
            "Isabella Castro",
            "isabella.castro@example.edu",
            "Barranquilla",
            "Feria",
            "No interesado",
            day(2025, 5, 28)?,
        ),
    ];

    for (id, name, email, city, channel, status, registered) in &prospects {
        sqlx::query(
            r#"
            INSERT INTO prospecto
            (prospecto_id, tipo_documento, nombre, correo, ciudad, origen, estado,
             fecha_registro, consentimiento_datos)
            VALUES ($1, 'CC', $2, $3, $4, $5, $6, $7, TRUE)
            ON CONFLICT (prospecto_id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(email)
        .bind(city)
        .bind(channel)
        .bind(status)
        .bind(at(*registered, 10)?)
        .execute(pool)
        .await?;
    }

    let interactions = vec![
        ("3f1a0c2e-0001-4a00-8000-000000000001", 0, "kiosko-norte", "Test vocacional", "iniciar", "1", 11),
        ("3f1a0c2e-0001-4a00-8000-000000000002", 0, "kiosko-norte", "Test vocacional", "completar", "2", 12),
        ("3f1a0c2e-0001-4a00-8000-000000000003", 1, "kiosko-sur", "Realidad virtual", "iniciar", "1", 15),
        ("3f1a0c2e-0001-4a00-8000-000000000004", 2, "tablet-feria", "Test vocacional", "iniciar", "1", 9),
        ("3f1a0c2e-0001-4a00-8000-000000000005", 3, "kiosko-norte", "Catálogo", "consultar", "1", 16),
    ];

    for (interaction_id, prospect, device, module, action, step, hour) in interactions {
        let (prospect_id, _, _, _, _, _, registered) = &prospects[prospect];
        sqlx::query(
            r#"
            INSERT INTO interaccion
            (interaccion_id, prospecto_id, dispositivo_id, modulo, accion, orden_en_flujo,
             estado_interaccion, timestamp)
            VALUES ($1, $2, $3, $4, $5, $6, 'completado', $7)
            ON CONFLICT (interaccion_id) DO NOTHING
            "#,
        )
        .bind(Uuid::parse_str(interaction_id)?)
        .bind(prospect_id)
        .bind(device)
        .bind(module)
        .bind(action)
        .bind(step)
        .bind(at(*registered, hour)?)
        .execute(pool)
        .await?;
    }

    let tests = vec![
        ("3f1a0c2e-0002-4a00-8000-000000000001", 0, "88", "Alto"),
        ("3f1a0c2e-0002-4a00-8000-000000000002", 2, "64", "Medio"),
        ("3f1a0c2e-0002-4a00-8000-000000000003", 3, "37", "Bajo"),
    ];

    for (result_id, prospect, score, classification) in tests {
        let (prospect_id, _, _, _, _, _, registered) = &prospects[prospect];
        sqlx::query(
            r#"
            INSERT INTO test_resultado
            (resultado_id, prospecto_id, puntaje, clasificacion, timestamp)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (resultado_id) DO NOTHING
            "#,
        )
        .bind(Uuid::parse_str(result_id)?)
        .bind(prospect_id)
        .bind(score)
        .bind(classification)
        .bind(at(*registered, 13)?)
        .execute(pool)
        .await?;
    }

    let advisories = vec![
        ("3f1a0c2e-0003-4a00-8000-000000000001", 0, "asesor-07", "Presencial", "Financiación"),
        ("3f1a0c2e-0003-4a00-8000-000000000002", 1, "asesor-03", "Virtual", "Horarios"),
    ];

    for (advisory_id, prospect, advisor, modality, barriers) in advisories {
        let (prospect_id, _, _, _, _, _, registered) = &prospects[prospect];
        sqlx::query(
            r#"
            INSERT INTO asesoria
            (asesoria_id, prospecto_id, asesor_id, modalidad_preferida, barreras, fecha_asesoria)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (asesoria_id) DO NOTHING
            "#,
        )
        .bind(Uuid::parse_str(advisory_id)?)
        .bind(prospect_id)
        .bind(advisor)
        .bind(modality)
        .bind(barriers)
        .bind(at(*registered, 17)?)
        .execute(pool)
        .await?;
    }

    Ok(())
}

/// Imports prospects from CSV, updating existing rows matched by email.
/// Returns the number of rows inserted or updated.
pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        nombre: String,
        correo: String,
        celular: Option<String>,
        ciudad: Option<String>,
        origen: Option<String>,
        estado: Option<String>,
        dni: Option<String>,
        tipo_documento: Option<String>,
        fecha_registro: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut imported = 0usize;

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result.with_context(|| format!("invalid CSV row {}", line + 1))?;
        let registered = row
            .fecha_registro
            .as_deref()
            .and_then(normalize::parse_timestamp);

        let result = sqlx::query(
            r#"
            INSERT INTO prospecto
            (prospecto_id, tipo_documento, dni, nombre, correo, celular, ciudad, origen,
             estado, fecha_registro, consentimiento_datos)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, COALESCE($9, 'Nuevo'),
                    COALESCE($10, LOCALTIMESTAMP), TRUE)
            ON CONFLICT (correo) DO UPDATE
            SET nombre = EXCLUDED.nombre,
                celular = COALESCE(EXCLUDED.celular, prospecto.celular),
                ciudad = COALESCE(EXCLUDED.ciudad, prospecto.ciudad),
                origen = COALESCE(EXCLUDED.origen, prospecto.origen),
                estado = COALESCE($9, prospecto.estado),
                dni = COALESCE(EXCLUDED.dni, prospecto.dni),
                tipo_documento = COALESCE(EXCLUDED.tipo_documento, prospecto.tipo_documento)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&row.tipo_documento)
        .bind(&row.dni)
        .bind(&row.nombre)
        .bind(&row.correo)
        .bind(&row.celular)
        .bind(&row.ciudad)
        .bind(&row.origen)
        .bind(&row.estado)
        .bind(registered)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            imported += 1;
        }
    }

    info!(imported, path = %csv_path.display(), "imported prospects");
    Ok(imported)
}

/// Applies the set fields of `update` to one prospect. Returns `false` when no
/// prospect has that id.
pub async fn update_prospect(
    pool: &PgPool,
    id: Uuid,
    update: &ProspectUpdate,
) -> anyhow::Result<bool> {
    if update.is_empty() {
        anyhow::bail!("no fields to update");
    }

    let mut query = QueryBuilder::<Postgres>::new("UPDATE prospecto SET ");
    let mut fields = query.separated(", ");
    let columns = [
        ("nombre", update.name.clone()),
        ("correo", update.email.clone()),
        ("celular", update.phone.clone()),
        ("ciudad", update.city.clone()),
        ("origen", update.channel.clone()),
        ("estado", update.status.map(|status| status.label().to_string())),
    ];
    for (column, value) in columns {
        if let Some(value) = value {
            fields.push(format!("{column} = "));
            fields.push_bind_unseparated(value);
        }
    }
    query.push(" WHERE prospecto_id = ").push_bind(id);

    let result = query
        .build()
        .execute(pool)
        .await
        .with_context(|| format!("failed to update prospect {id}"))?;
    let updated = result.rows_affected() > 0;
    info!(%id, updated, "prospect update");
    Ok(updated)
}

fn timestamp_value(at: Option<NaiveDateTime>) -> Value {
    match at {
        Some(at) => Value::String(at.format("%Y-%m-%dT%H:%M:%S").to_string()),
        None => Value::Null,
    }
}

fn id_value(id: Option<Uuid>) -> Value {
    match id {
        Some(id) => Value::String(id.to_string()),
        None => Value::Null,
    }
}

/// Appends the date window on `column` and, when set, the prospect id.
fn push_common_filters(query: &mut QueryBuilder<'_, Postgres>, column: &str, filters: &ReportFilters) {
    if let Some(start) = filters.start_date {
        query.push(format!(" AND {column}::date >= ")).push_bind(start);
    }
    if let Some(end) = filters.end_date {
        query.push(format!(" AND {column}::date <= ")).push_bind(end);
    }
    if let Some(id) = filters.prospect_id {
        query.push(" AND prospecto_id = ").push_bind(id);
    }
}

fn prospect_row(row: &PgRow) -> Result<Value, sqlx::Error> {
    Ok(json!({
        "id": id_value(row.try_get("prospecto_id")?),
        "tipo_documento": row.try_get::<Option<String>, _>("tipo_documento")?,
        "dni": row.try_get::<Option<String>, _>("dni")?,
        "nombre": row.try_get::<Option<String>, _>("nombre")?,
        "correo": row.try_get::<Option<String>, _>("correo")?,
        "celular": row.try_get::<Option<String>, _>("celular")?,
        "ciudad": row.try_get::<Option<String>, _>("ciudad")?,
        "origen": row.try_get::<Option<String>, _>("origen")?,
        "estado": row.try_get::<Option<String>, _>("estado")?,
        "fecha_registro": timestamp_value(row.try_get("fecha_registro")?),
        "consentimiento_datos": row.try_get::<Option<bool>, _>("consentimiento_datos")?,
    }))
}

fn interaction_row(row: &PgRow) -> Result<Value, sqlx::Error> {
    Ok(json!({
        "prospecto_id": id_value(row.try_get("prospecto_id")?),
        "modulo": row.try_get::<Option<String>, _>("modulo")?,
        "accion": row.try_get::<Option<String>, _>("accion")?,
        "dispositivo_id": row.try_get::<Option<String>, _>("dispositivo_id")?,
        "estado": row.try_get::<Option<String>, _>("estado_interaccion")?,
        "orden_en_flujo": row.try_get::<Option<String>, _>("orden_en_flujo")?,
        "timestamp": timestamp_value(row.try_get("timestamp")?),
    }))
}

fn test_row(row: &PgRow) -> Result<Value, sqlx::Error> {
    Ok(json!({
        "prospecto_id": id_value(row.try_get("prospecto_id")?),
        "test_id": id_value(row.try_get("test_id")?),
        "puntaje": row.try_get::<Option<String>, _>("puntaje")?,
        "clasificacion": row.try_get::<Option<String>, _>("clasificacion")?,
        "timestamp": timestamp_value(row.try_get("timestamp")?),
    }))
}

fn advisory_row(row: &PgRow) -> Result<Value, sqlx::Error> {
    Ok(json!({
        "prospecto_id": id_value(row.try_get("prospecto_id")?),
        "asesor_id": row.try_get::<Option<String>, _>("asesor_id")?,
        "motivaciones": row.try_get::<Option<String>, _>("motivaciones")?,
        "barreras": row.try_get::<Option<String>, _>("barreras")?,
        "modalidad_preferida": row.try_get::<Option<String>, _>("modalidad_preferida")?,
        "observaciones": row.try_get::<Option<String>, _>("observaciones")?,
        "fecha_asesoria": timestamp_value(row.try_get("fecha_asesoria")?),
    }))
}

/// Reads one record-level payload and wraps it in the backend's report
/// envelope. Aggregate payloads are only available as files.
pub async fn fetch_payload(
    pool: &PgPool,
    kind: PayloadKind,
    filters: &ReportFilters,
    generated_at: NaiveDateTime,
) -> Result<Value, SourceError> {
    let (mut query, render): (QueryBuilder<Postgres>, fn(&PgRow) -> Result<Value, sqlx::Error>) =
        match kind {
            PayloadKind::Prospects => {
                let mut query = QueryBuilder::new(
                    "SELECT prospecto_id, tipo_documento, dni, nombre, correo, celular, ciudad, \
                     origen, estado, fecha_registro, consentimiento_datos \
                     FROM prospecto WHERE TRUE",
                );
                push_common_filters(&mut query, "fecha_registro", filters);
                if let Some(city) = &filters.city {
                    query.push(" AND ciudad = ").push_bind(city.clone());
                }
                if let Some(channel) = &filters.channel {
                    query.push(" AND origen = ").push_bind(channel.clone());
                }
                if let Some(status) = &filters.status {
                    query.push(" AND estado = ").push_bind(status.clone());
                }
                query.push(" ORDER BY fecha_registro DESC NULLS LAST");
                (query, prospect_row)
            }
            PayloadKind::Interactions => {
                let mut query = QueryBuilder::new(
                    "SELECT prospecto_id, modulo, accion, dispositivo_id, estado_interaccion, \
                     orden_en_flujo, timestamp FROM interaccion WHERE TRUE",
                );
                push_common_filters(&mut query, r#""timestamp""#, filters);
                query.push(r#" ORDER BY "timestamp" DESC NULLS LAST"#);
                (query, interaction_row)
            }
            PayloadKind::Tests => {
                let mut query = QueryBuilder::new(
                    "SELECT prospecto_id, test_id, puntaje, clasificacion, timestamp \
                     FROM test_resultado WHERE TRUE",
                );
                push_common_filters(&mut query, r#""timestamp""#, filters);
                query.push(r#" ORDER BY "timestamp" DESC NULLS LAST"#);
                (query, test_row)
            }
            PayloadKind::Advisories => {
                let mut query = QueryBuilder::new(
                    "SELECT prospecto_id, asesor_id, motivaciones, barreras, modalidad_preferida, \
                     observaciones, fecha_asesoria FROM asesoria WHERE TRUE",
                );
                push_common_filters(&mut query, "fecha_asesoria", filters);
                query.push(" ORDER BY fecha_asesoria DESC NULLS LAST");
                (query, advisory_row)
            }
            PayloadKind::Channels | PayloadKind::Geographic | PayloadKind::Conversions => {
                return Err(SourceError::NotRecordLevel(kind));
            }
        };

    let records = query.build().fetch_all(pool).await?;
    let rows = records
        .iter()
        .map(render)
        .collect::<Result<Vec<_>, _>>()?;
    debug!(report = kind.report_type(), rows = rows.len(), "fetched payload");

    Ok(source::envelope(kind, filters, rows, generated_at))
}
