use once_cell::sync::Lazy;
use regex::Regex;

static UNIPROT_ACCESSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b([OPQ][0-9][A-Z0-9]{3}[0-9]|[A-NR-Z][0-9](?:[A-Z][A-Z0-9]{2}[0-9]){1,2})(-\d+)?\b",
    )
    .expect("valid accession pattern")
});

pub fn split_primary_id(primary_id: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    for token in primary_id.split(';').map(str::trim) {
        if !token.is_empty() && !tokens.iter().any(|seen| seen == token) {
            tokens.push(token.to_string());
        }
    }
    tokens
}

/// Extracts the base UniProt accession from a token such as
/// `sp|P12345|NAME_HUMAN` or `P12345-2`.
pub fn accession_from_token(token: &str) -> Option<String> {
    let candidate = if token.contains('|') {
        token.split('|').nth(1).unwrap_or(token)
    } else {
        token
    };
    UNIPROT_ACCESSION
        .captures(candidate)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn split_gene_names(gene_names: &str) -> Vec<String> {
    let mut genes: Vec<String> = Vec::new();
    for gene in gene_names
        .split(|ch: char| ch == ';' || ch.is_whitespace())
        .map(str::trim)
    {
        if !gene.is_empty() && !genes.iter().any(|seen| seen == gene) {
            genes.push(gene.to_string());
        }
    }
    genes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_compound_ids() {
        assert_eq!(split_primary_id("P12345;P67890"), vec!["P12345", "P67890"]);
        assert_eq!(split_primary_id(" P1 ;;P1;P2 "), vec!["P1", "P2"]);
        assert!(split_primary_id(";").is_empty());
    }

    #[test]
    fn accession_extraction() {
        assert_eq!(accession_from_token("P12345").as_deref(), Some("P12345"));
        assert_eq!(accession_from_token("Q9Y6K9-2").as_deref(), Some("Q9Y6K9"));
        assert_eq!(
            accession_from_token("sp|P69905|HBA_HUMAN").as_deref(),
            Some("P69905")
        );
        assert_eq!(
            accession_from_token("A0A024RBG1").as_deref(),
            Some("A0A024RBG1")
        );
        assert_eq!(accession_from_token("not-an-id"), None);
    }

    #[test]
    fn gene_name_splitting() {
        assert_eq!(split_gene_names("HBA1 HBA2;HBA1"), vec!["HBA1", "HBA2"]);
        assert!(split_gene_names("  ").is_empty());
    }
}
