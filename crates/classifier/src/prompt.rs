// Classification prompt

use ncm_recon::ReferenceEntry;

/// Longest product name sent to the model; anything past it is noise.
const MAX_NAME_CHARS: usize = 200;

/// Build the prompt for one product.
///
/// The candidate lines are the only table context the model sees, so the
/// prompt stays bounded no matter how large the reference table is.
pub fn build_prompt(product_name: &str, candidates: &[&ReferenceEntry]) -> String {
    let name: String = product_name.trim().chars().take(MAX_NAME_CHARS).collect();

    let mut out = String::with_capacity(256 + candidates.len() * 80);
    out.push_str("Você é um auditor fiscal. Classifique o PRODUTO com o NCM de 8 dígitos correto.\n");
    out.push_str("Compare com os exemplos da tabela oficial para garantir precisão.\n\n");
    out.push_str("PRODUTO: ");
    out.push_str(&name);
    out.push_str("\n\nEXEMPLOS DA TABELA OFICIAL:\n");
    if candidates.is_empty() {
        out.push_str("(nenhum)\n");
    }
    for entry in candidates {
        out.push_str(entry.code.as_str());
        out.push_str(" - ");
        out.push_str(entry.label.trim());
        out.push('\n');
    }
    out.push_str("\nResponda APENAS o número do NCM (6 a 8 dígitos). Se não tiver certeza, responda '0'.\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ncm_recon::NcmCode;

    fn entry(code: &str, label: &str) -> ReferenceEntry {
        ReferenceEntry {
            code: NcmCode::parse(code).unwrap(),
            description: label.to_uppercase(),
            label: label.into(),
        }
    }

    #[test]
    fn test_prompt_lists_candidates() {
        let a = entry("01012100", "Cavalos reprodutores de raça pura");
        let b = entry("01019000", "Outros cavalos");
        let prompt = build_prompt("  Cavalo árabe ", &[&a, &b]);

        assert!(prompt.contains("PRODUTO: Cavalo árabe\n"));
        assert!(prompt.contains("01012100 - Cavalos reprodutores de raça pura\n"));
        assert!(prompt.contains("01019000 - Outros cavalos\n"));
        assert!(prompt.contains("responda '0'"));
    }

    #[test]
    fn test_prompt_without_candidates() {
        let prompt = build_prompt("Widget", &[]);
        assert!(prompt.contains("(nenhum)"));
    }

    #[test]
    fn test_long_name_truncated() {
        let name = "x".repeat(1000);
        let prompt = build_prompt(&name, &[]);
        assert!(prompt.contains(&"x".repeat(MAX_NAME_CHARS)));
        assert!(!prompt.contains(&"x".repeat(MAX_NAME_CHARS + 1)));
    }
}
