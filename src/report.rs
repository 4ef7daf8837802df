// report.rs
// PDF report of lançamentos. Builds a typst document from the filtered
// entries and shells out to the typst binary (TYPST_BIN, default `typst`).

use std::{
    fs,
    process::{Command, Stdio},
};

use rand::{Rng, distr::Alphanumeric};

use crate::models::FinancialEntry;

/// Filters echoed in the report header.
#[derive(Debug, Default)]
pub struct ReportFilters {
    pub competencia: Option<String>,
    pub status: Option<String>,
    pub tipo: Option<String>,
}

/// Renders the typst source for the lançamentos report.
pub fn lancamentos_report_source(entries: &[FinancialEntry], filters: &ReportFilters) -> String {
    let mut header = Vec::new();
    if let Some(c) = &filters.competencia {
        header.push(format!("Competência: {}", escape_typst(c)));
    }
    if let Some(s) = &filters.status {
        header.push(format!("Situação: {}", escape_typst(s)));
    }
    if let Some(t) = &filters.tipo {
        header.push(format!("Tipo: {}", escape_typst(t)));
    }
    let subtitle = if header.is_empty() {
        "Todos os lançamentos".to_string()
    } else {
        header.join(" · ")
    };

    let mut rows = String::new();
    let mut total_valor = 0.0f64;
    let mut total_pago = 0.0f64;
    for entry in entries {
        total_valor += entry.valor_liquido();
        total_pago += entry.valor_pago;
        rows.push_str(&format!(
            "  [{}], [{}], [{}], [{}], [{}], [R\\$ {:.2}], [R\\$ {:.2}],\n",
            entry.numero,
            escape_typst(&entry.historico),
            entry.tipo.as_str(),
            escape_typst(&entry.competencia),
            entry.status.as_str(),
            entry.valor_liquido(),
            entry.valor_pago,
        ));
    }

    format!(
        r#"#set page(paper: "a4", margin: 2cm)
#set text(font: "Libertinus Serif", size: 9pt)

#align(center)[
  #text(size: 16pt, weight: "bold")[Relatório de Lançamentos]

  #text(size: 10pt)[{subtitle}]
]

#v(1em)

#table(
  columns: (auto, 1fr, auto, auto, auto, auto, auto),
  inset: 5pt,
  stroke: 0.5pt + gray,
  table.header(
    [*Nº*], [*Histórico*], [*Tipo*], [*Competência*], [*Situação*], [*Valor*], [*Pago*],
  ),
{rows})

#v(1em)

#align(right)[
  *Total:* R\$ {total_valor:.2} #h(1em) *Pago:* R\$ {total_pago:.2} #h(1em) ({count} lançamentos)
]
"#,
        count = entries.len(),
    )
}

fn escape_typst(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' | '#' | '$' | '*' | '_' | '`' | '<' | '>' | '@' | '[' | ']' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

/// Compiles typst source into PDF bytes using a scratch directory.
pub fn compile_typst(source: &str) -> Result<Vec<u8>, String> {
    let mut rng = rand::rng();
    let suffix: String = (&mut rng)
        .sample_iter(&Alphanumeric)
        .take(12)
        .map(char::from)
        .collect();

    let tmp_dir = std::env::temp_dir().join(format!("typst-{}", suffix));
    fs::create_dir(&tmp_dir).map_err(|e| format!("não foi possível criar diretório temporário: {e}"))?;

    let input_path = tmp_dir.join("input.typ");
    let output_path = tmp_dir.join("output.pdf");

    if let Err(err) = fs::write(&input_path, source) {
        let _ = fs::remove_dir_all(&tmp_dir);
        return Err(format!("não foi possível escrever arquivo temporário: {err}"));
    }

    let typst_bin = std::env::var("TYPST_BIN").unwrap_or_else(|_| "typst".to_string());

    let output = Command::new(&typst_bin)
        .arg("compile")
        .arg(&input_path)
        .arg(&output_path)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|err| {
            let _ = fs::remove_dir_all(&tmp_dir);
            if err.kind() == std::io::ErrorKind::NotFound {
                format!(
                    "binário `{}` não encontrado; instale-o ou defina TYPST_BIN",
                    typst_bin
                )
            } else {
                format!("erro executando typst: {err}")
            }
        })?;

    if !output.status.success() {
        let _ = fs::remove_dir_all(&tmp_dir);
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        return Err(if stderr.trim().is_empty() {
            "falha ao executar typst".to_string()
        } else {
            stderr
        });
    }

    let pdf_bytes = fs::read(&output_path)
        .map_err(|err| format!("não foi possível ler o PDF gerado: {err}"))?;

    let _ = fs::remove_dir_all(&tmp_dir);
    Ok(pdf_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntryKind, EntryStatus};
    use mongodb::bson::DateTime;

    fn entry(numero: i64, historico: &str, valor: f64, pago: f64) -> FinancialEntry {
        FinancialEntry {
            id: None,
            numero,
            tipo: EntryKind::Receber,
            historico: historico.to_string(),
            id_pessoa: None,
            id_conta_bancaria: None,
            valor,
            valor_desconto: 0.0,
            valor_juros: 0.0,
            valor_multa: 0.0,
            valor_pago: pago,
            data_movimento: DateTime::now(),
            data_vencimento: DateTime::now(),
            competencia: "2026-08".to_string(),
            reter_inss: false,
            perc_inss: None,
            valor_inss: None,
            reter_iss: false,
            perc_iss: None,
            valor_iss: None,
            forma_pagamento: None,
            data_pagamento: None,
            status: EntryStatus::Aberto,
            motivo: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn source_carries_rows_and_totals() {
        let entries = vec![
            entry(1, "Aluguel sala 101", 1500.0, 0.0),
            entry(2, "Condomínio", 500.0, 500.0),
        ];
        let src = lancamentos_report_source(&entries, &ReportFilters::default());
        assert!(src.contains("Aluguel sala 101"));
        assert!(src.contains("R\\$ 1500.00"));
        assert!(src.contains("(2 lançamentos)"));
        assert!(src.contains("Todos os lançamentos"));
    }

    #[test]
    fn filters_show_in_subtitle() {
        let filters = ReportFilters {
            competencia: Some("2026-08".to_string()),
            status: Some("aberto".to_string()),
            tipo: None,
        };
        let src = lancamentos_report_source(&[], &filters);
        assert!(src.contains("Competência: 2026-08"));
        assert!(src.contains("Situação: aberto"));
    }

    #[test]
    fn markup_in_historico_is_escaped() {
        let entries = vec![entry(1, "Taxa #extra [ajuste]", 10.0, 0.0)];
        let src = lancamentos_report_source(&entries, &ReportFilters::default());
        assert!(src.contains("Taxa \\#extra \\[ajuste\\]"));
    }
}
