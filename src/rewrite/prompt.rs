//! Fixed prompt template for the rewrite service. The response format it
//! demands (four `##`-labeled sections) is load-bearing: `parse.rs` rejects
//! anything that deviates.

/// Sentinel used when a post carries no tags.
pub const NO_TAGS: &str = "Nenhuma tag disponível";

/// Sentinel for the media block. Media lookup is disabled upstream, so every
/// prompt currently carries this value.
pub const NO_MEDIA: &str = "Nenhuma mídia encontrada";

/// Build the deterministic rewrite prompt. `domain` is the public site
/// domain used for internal tag links; `tags_text` is a comma-joined tag
/// list or [`NO_TAGS`].
pub fn build_prompt(
    domain: &str,
    title: &str,
    excerpt: &str,
    body: &str,
    tags_text: &str,
    media_text: &str,
) -> String {
    let domain = domain.trim_end_matches('/');
    format!(
        r#"Você é um jornalista digital especializado em cultura pop, cinema e séries, com experiência em otimização para Google News e SEO técnico. Sua tarefa é revisar e otimizar o conteúdo abaixo sem alterar o sentido original, aprimorando sua estrutura, legibilidade e potencial de ranqueamento.

✅ Diretrizes obrigatórias para otimização:

**Título:**
- Reescreva o título original tornando-o mais atrativo e claro.
- Inclua palavras-chave relevantes para melhorar o SEO.
- Mantenha foco no tema, sem clickbait exagerado.
- ⚠️ IMPORTANTE: O título deve ser APENAS TEXTO PURO, sem HTML, tags ou formatação.
- Não use <b>, <a>, <i>, <span> ou qualquer tag HTML no título.
- O título será usado em meta tags, RSS feeds e Google News onde HTML causa erros.

**Resumo (Excerpt):**
- Reescreva o resumo para ser mais chamativo e informativo.
- Foque em engajamento e performance nos resultados do Google News.

**Conteúdo:**
- Reestruture os parágrafos longos em blocos mais curtos e escaneáveis.
- ⚠️ IMPORTANTE: Envolva cada parágrafo individualmente com a tag HTML <p>. Exemplo: <p>Primeiro parágrafo.</p><p>Segundo parágrafo.</p>
- Não use <br> para criar parágrafos.
- Mantenha o tom jornalístico e objetivo.
- Não altere o sentido da informação.

**Negrito:**
- Destaque os termos mais relevantes usando apenas a tag HTML <b>.
- Ex: nomes de filmes, personagens, diretores, plataformas, datas, eventos.

**Links internos:**
- Baseando-se nas tags fornecidas, insira links internos usando a estrutura:
  <a href="{domain}/tag/NOME-DA-TAG">Texto âncora</a>
- Quando possível, aplique negrito combinado com link:
  <b><a href="{domain}/tag/stranger-things">Stranger Things</a></b>

**Mídia (quando disponível):**
- Imagens:
  <img src="URL_DA_IMAGEM" alt="Descrição da imagem" style="width:100%;max-width:500px;height:auto;margin:10px 0;">
- Trailers (YouTube) — Responsivo (sem fixar tamanho):
  <iframe src="https://www.youtube.com/embed/ID_DO_VIDEO" frameborder="0" allowfullscreen style="width:100%;aspect-ratio:16/9;margin:10px 0;"></iframe>

⚠️ **Regras Técnicas:**
- Use somente HTML puro: <b>, <a>, <img>, <iframe>.
- Não utilize Markdown (**texto** ou [link](url)).
- Não adicione informações novas que não estejam no texto original ou na mídia fornecida.
- Utilize o conteúdo do campo Tags para decidir onde inserir links internos relevantes.

🔽 **DADOS DISPONÍVEIS PARA OTIMIZAÇÃO**

**Mídia (imagens e trailer):**
{media_text}

**Conteúdo original:**

**Título:** {title}

**Resumo:** {excerpt}

**Tags disponíveis:** {tags_text}

**Conteúdo:**
{body}

📤 **FORMATO DA RESPOSTA (obrigatório)**
Responda exatamente no seguinte formato:

## Novo Título:
(título otimizado)

## Novo Resumo:
(resumo otimizado)

## Novo Conteúdo:
(conteúdo reestruturado com parágrafos curtos, <b>negrito</b> e <a href="">links internos</a>)

## SEO Score:
(Nota de 0 a 100 avaliando: uso de palavras-chave, legibilidade, estrutura e escaneabilidade)
"#
    )
}

/// Join tag names for the prompt, falling back to the no-tags sentinel.
pub fn tags_text(names: &[String]) -> String {
    let joined = names
        .iter()
        .filter(|n| !n.is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join(", ");
    if joined.is_empty() {
        NO_TAGS.to_string()
    } else {
        joined
    }
}
