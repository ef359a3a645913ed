use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::types::{lenient_string, lenient_timestamp};

/// Column order shared by every INSERT and by row binding
pub const RECORD_COLUMNS: [&str; 32] = [
    "id",
    "numero_beneficio",
    "numero_documento",
    "nome",
    "estado",
    "pensao",
    "data_nascimento",
    "tipo_bloqueio",
    "data_concessao",
    "tipo_credito",
    "limite_cartao_beneficio",
    "saldo_cartao_beneficio",
    "status_beneficio",
    "data_fim_beneficio",
    "limite_cartao_consignado",
    "saldo_cartao_consignado",
    "saldo_credito_consignado",
    "saldo_total_maximo",
    "saldo_total_utilizado",
    "saldo_total_disponivel",
    "data_consulta",
    "data_retorno_consulta",
    "tempo_retorno_consulta",
    "nome_representante_legal",
    "banco_desembolso",
    "agencia_desembolso",
    "numero_conta_desembolso",
    "digito_conta_desembolso",
    "numero_portabilidades",
    "ip_origem",
    "data_hora_registro",
    "nome_arquivo",
];

/// Natural key of a benefit record: beneficiary document (CPF) + benefit number
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NaturalKey {
    pub document_number: String,
    pub benefit_number: String,
}

/// Who asked for a record, when, and from which batch file
#[derive(Debug, Clone, PartialEq)]
pub struct Provenance {
    pub origin_ip: Option<String>,
    pub registered_at: DateTime<Utc>,
    pub source_file_name: Option<String>,
}

/// Descriptive and financial data of a benefit, as returned by the inquiry provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
pub struct BenefitDetails {
    #[serde(rename = "nome", default)]
    #[sqlx(rename = "nome")]
    pub name: Option<String>,
    #[serde(rename = "estado", default)]
    #[sqlx(rename = "estado")]
    pub state: Option<String>,
    #[serde(rename = "pensao", default, deserialize_with = "lenient_string")]
    #[sqlx(rename = "pensao")]
    pub alimony: Option<String>,
    #[serde(rename = "data_nascimento", default)]
    #[sqlx(rename = "data_nascimento")]
    pub birth_date: Option<String>,
    #[serde(rename = "tipo_bloqueio", default)]
    #[sqlx(rename = "tipo_bloqueio")]
    pub block_type: Option<String>,
    #[serde(rename = "data_concessao", default)]
    #[sqlx(rename = "data_concessao")]
    pub grant_date: Option<String>,
    #[serde(rename = "tipo_credito", default)]
    #[sqlx(rename = "tipo_credito")]
    pub credit_type: Option<String>,
    #[serde(rename = "limite_cartao_beneficio", default)]
    #[sqlx(rename = "limite_cartao_beneficio")]
    pub benefit_card_limit: Option<Decimal>,
    #[serde(rename = "saldo_cartao_beneficio", default)]
    #[sqlx(rename = "saldo_cartao_beneficio")]
    pub benefit_card_balance: Option<Decimal>,
    #[serde(rename = "status_beneficio", default)]
    #[sqlx(rename = "status_beneficio")]
    pub benefit_status: Option<String>,
    #[serde(rename = "data_fim_beneficio", default)]
    #[sqlx(rename = "data_fim_beneficio")]
    pub benefit_end_date: Option<String>,
    #[serde(rename = "limite_cartao_consignado", default)]
    #[sqlx(rename = "limite_cartao_consignado")]
    pub consigned_card_limit: Option<Decimal>,
    #[serde(rename = "saldo_cartao_consignado", default)]
    #[sqlx(rename = "saldo_cartao_consignado")]
    pub consigned_card_balance: Option<Decimal>,
    #[serde(rename = "saldo_credito_consignado", default)]
    #[sqlx(rename = "saldo_credito_consignado")]
    pub consigned_credit_balance: Option<Decimal>,
    #[serde(rename = "saldo_total_maximo", default)]
    #[sqlx(rename = "saldo_total_maximo")]
    pub max_total_balance: Option<Decimal>,
    #[serde(rename = "saldo_total_utilizado", default)]
    #[sqlx(rename = "saldo_total_utilizado")]
    pub used_total_balance: Option<Decimal>,
    #[serde(rename = "saldo_total_disponivel", default)]
    #[sqlx(rename = "saldo_total_disponivel")]
    pub available_total_balance: Option<Decimal>,
    #[serde(rename = "data_consulta", default)]
    #[sqlx(rename = "data_consulta")]
    pub query_date: Option<String>,
    #[serde(rename = "data_retorno_consulta", default)]
    #[sqlx(rename = "data_retorno_consulta")]
    pub query_return_date: Option<String>,
    #[serde(rename = "tempo_retorno_consulta", default, deserialize_with = "lenient_string")]
    #[sqlx(rename = "tempo_retorno_consulta")]
    pub query_return_time: Option<String>,
    #[serde(rename = "nome_representante_legal", default)]
    #[sqlx(rename = "nome_representante_legal")]
    pub legal_representative_name: Option<String>,
    #[serde(rename = "banco_desembolso", default, deserialize_with = "lenient_string")]
    #[sqlx(rename = "banco_desembolso")]
    pub disbursement_bank: Option<String>,
    #[serde(rename = "agencia_desembolso", default, deserialize_with = "lenient_string")]
    #[sqlx(rename = "agencia_desembolso")]
    pub disbursement_branch: Option<String>,
    #[serde(rename = "numero_conta_desembolso", default, deserialize_with = "lenient_string")]
    #[sqlx(rename = "numero_conta_desembolso")]
    pub disbursement_account: Option<String>,
    #[serde(rename = "digito_conta_desembolso", default, deserialize_with = "lenient_string")]
    #[sqlx(rename = "digito_conta_desembolso")]
    pub disbursement_digit: Option<String>,
    #[serde(rename = "numero_portabilidades", default)]
    #[sqlx(rename = "numero_portabilidades")]
    pub portability_count: Option<i32>,
}

/// One stored benefit-inquiry result row (`inss_higienizado`)
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct BenefitRecord {
    pub id: String,
    #[serde(rename = "numero_beneficio")]
    #[sqlx(rename = "numero_beneficio")]
    pub benefit_number: String,
    #[serde(rename = "numero_documento")]
    #[sqlx(rename = "numero_documento")]
    pub document_number: String,
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub details: BenefitDetails,
    #[serde(rename = "ip_origem")]
    #[sqlx(rename = "ip_origem")]
    pub origin_ip: Option<String>,
    #[serde(rename = "data_hora_registro")]
    #[sqlx(rename = "data_hora_registro")]
    pub registered_at: DateTime<Utc>,
    #[serde(rename = "nome_arquivo")]
    #[sqlx(rename = "nome_arquivo")]
    pub source_file_name: Option<String>,
}

impl BenefitRecord {
    pub fn new(id: String, key: NaturalKey, details: BenefitDetails, provenance: Provenance) -> Self {
        Self {
            id,
            benefit_number: key.benefit_number,
            document_number: key.document_number,
            details,
            origin_ip: provenance.origin_ip,
            registered_at: provenance.registered_at,
            source_file_name: provenance.source_file_name,
        }
    }

    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey {
            document_number: self.document_number.clone(),
            benefit_number: self.benefit_number.clone(),
        }
    }

    /// Copy of this row under a fresh id with new provenance; benefit data is untouched.
    pub fn duplicate(&self, provenance: Provenance) -> Self {
        Self::new(
            Uuid::new_v4().to_string(),
            self.natural_key(),
            self.details.clone(),
            provenance,
        )
    }
}

/// Body of `POST /api/insert`. Everything is optional so that validation
/// failures surface as field errors instead of extractor rejections.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordPayload {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub numero_beneficio: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub numero_documento: Option<String>,
    #[serde(flatten)]
    pub details: BenefitDetails,
    #[serde(default)]
    pub ip_origem: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub data_hora_registro: Option<DateTime<Utc>>,
    #[serde(default)]
    pub nome_arquivo: Option<String>,
}

impl RecordPayload {
    /// Validated natural key, or the list of missing field names.
    pub fn natural_key(&self) -> Result<NaturalKey, Vec<&'static str>> {
        let document = non_blank(&self.numero_documento);
        let benefit = non_blank(&self.numero_beneficio);
        match (document, benefit) {
            (Some(document_number), Some(benefit_number)) => Ok(NaturalKey {
                document_number,
                benefit_number,
            }),
            (document, benefit) => {
                let mut missing = Vec::new();
                if document.is_none() {
                    missing.push("numero_documento");
                }
                if benefit.is_none() {
                    missing.push("numero_beneficio");
                }
                Err(missing)
            }
        }
    }

    /// Provenance for this request; the caller IP stands in when the body has none.
    pub fn provenance(&self, caller_ip: &str, now: DateTime<Utc>) -> Provenance {
        Provenance {
            origin_ip: non_blank(&self.ip_origem).or_else(|| Some(caller_ip.to_string())),
            registered_at: self.data_hora_registro.unwrap_or(now),
            source_file_name: non_blank(&self.nome_arquivo),
        }
    }

    pub fn supplied_id(&self) -> Option<String> {
        non_blank(&self.id)
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
